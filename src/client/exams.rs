//! Past-exam listing, creation, and file sub-resources.

use serde::Deserialize;

use super::{ApiClient, ApiError, check_status};

/// A file attached to a past exam.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamFile {
    pub id: i64,
    pub name: String,
}

/// A past exam as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastExam {
    pub id: i64,
    pub year: i32,
    pub term: String,
    #[serde(default)]
    pub department_id: Option<i64>,
    pub course_code: String,
    pub title: String,
    #[serde(default)]
    pub instructor_id: Option<i64>,
    #[serde(default)]
    pub files: Vec<ExamFile>,
}

/// Parameters for creating a past exam. Sent as multipart form fields.
#[derive(Debug, Clone)]
pub struct NewPastExam {
    pub year: i32,
    pub term: String,
    pub department_id: i64,
    pub course_code: String,
    pub title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExamPage {
    #[serde(default)]
    past_exams: Vec<PastExam>,
}

impl ApiClient {
    /// List past exams, paginated.
    pub async fn list_exams(&self, page: u32, page_size: u32) -> Result<Vec<PastExam>, ApiError> {
        let url = self.endpoint("past-exams");
        let response = self
            .send_authenticated(|http| {
                http.get(&url)
                    .query(&[("page", page), ("pageSize", page_size)])
            })
            .await?;
        let listing: ExamPage = self.expect_data(response).await?;
        Ok(listing.past_exams)
    }

    /// Fetch a single past exam.
    pub async fn get_exam(&self, id: i64) -> Result<PastExam, ApiError> {
        let url = self.endpoint(&format!("past-exams/{}", id));
        let response = self.send_authenticated(|http| http.get(&url)).await?;
        self.expect_data(response).await
    }

    /// Create a past exam. The term is lowercased before sending, matching
    /// the form values the backend expects.
    pub async fn create_exam(&self, exam: &NewPastExam) -> Result<PastExam, ApiError> {
        let url = self.endpoint("past-exams");
        let year = exam.year.to_string();
        let term = exam.term.to_lowercase();
        let department_id = exam.department_id.to_string();
        let course_code = exam.course_code.clone();
        let title = exam.title.clone();

        let response = self
            .send_authenticated(|http| {
                let form = reqwest::multipart::Form::new()
                    .text("year", year.clone())
                    .text("term", term.clone())
                    .text("departmentId", department_id.clone())
                    .text("courseCode", course_code.clone())
                    .text("title", title.clone());
                http.post(&url).multipart(form)
            })
            .await?;
        self.expect_data(response).await
    }

    /// Attach a file to an existing past exam.
    pub async fn add_exam_file(
        &self,
        exam_id: i64,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<ExamFile, ApiError> {
        reqwest::multipart::Part::bytes(Vec::new())
            .mime_str(mime)
            .map_err(|_| ApiError::Invalid(format!("invalid mime type: {}", mime)))?;

        let url = self.endpoint(&format!("past-exams/{}/files", exam_id));
        let file_name = file_name.to_string();
        let mime = mime.to_string();
        let response = self
            .send_authenticated(|http| {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(&mime)
                    .expect("mime validated above");
                http.post(&url)
                    .multipart(reqwest::multipart::Form::new().part("file", part))
            })
            .await?;
        self.expect_data(response).await
    }

    /// Remove a file from a past exam.
    pub async fn delete_exam_file(&self, exam_id: i64, file_id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("past-exams/{}/files/{}", exam_id, file_id));
        let response = self.send_authenticated(|http| http.delete(&url)).await?;
        check_status(response).await?;
        Ok(())
    }
}
