use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use crate::backend::BackendResult;
use crate::models::{
    DeclineSubmission, Document, DocumentDetail, DocumentStatus, Field, FieldPatch, InviteRequest, InviteResponse,
    LogEntry, NewDocument, NewField, Page, SignSubmission, Signer, SigningView,
};
use crate::models::{DocumentID, FieldID, SignerID};
use crate::SharedBackend;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<std::net::IpAddr>,
    pub user_agent: Option<String>,
}

#[rocket::async_trait]
impl<'r> rocket::request::FromRequest<'r> for ClientMeta {
    type Error = &'static str;

    async fn from_request(request: &'r rocket::Request<'_>) -> rocket::request::Outcome<Self, Self::Error> {
        let mut ip = request.client_ip();

        if let Some(std::net::IpAddr::V6(v6_ip)) = ip {
            if let Some(v4_ip) = v6_ip.to_ipv4() {
                ip = Some(std::net::IpAddr::V4(v4_ip));
            }
        }

        rocket::request::Outcome::Success(ClientMeta {
            ip,
            user_agent: request.headers().get_one("User-Agent").map(|v| v.to_string()),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = Custom<Json<ErrorBody>>;
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: Status, message: String) -> ApiError {
    Custom(status, Json(ErrorBody {
        error: message
    }))
}

fn respond<T>(result: BackendResult<T>) -> ApiResult<T> {
    match result {
        Ok(v) => Ok(Json(v)),
        Err(err) => {
            let status = err.status();
            if status == Status::InternalServerError {
                error!("Backend failure: {}", err);
            } else {
                warn!("Request rejected ({}): {}", status.code, err);
            }
            Err(api_error(status, err.to_string()))
        }
    }
}

#[post("/documents", data = "<data>", format = "application/json")]
pub async fn create_document(
    backend: &rocket::State<SharedBackend>, data: Json<NewDocument>, client_meta: ClientMeta,
) -> Result<Custom<Json<Document>>, ApiError> {
    respond(backend.create_document(data.into_inner(), &client_meta))
        .map(|d| Custom(Status::Created, d))
}

#[get("/documents?<status>&<search>&<page>&<limit>")]
pub async fn documents(
    backend: &rocket::State<SharedBackend>, status: Option<String>, search: Option<String>,
    page: Option<usize>, limit: Option<usize>,
) -> ApiResult<Page<Document>> {
    let status = match status.as_deref().map(str::parse::<DocumentStatus>).transpose() {
        Ok(s) => s,
        Err(err) => return Err(api_error(Status::BadRequest, err)),
    };
    respond(backend.list_documents(status, search, page, limit))
}

#[get("/documents/<did>")]
pub async fn document(backend: &rocket::State<SharedBackend>, did: DocumentID) -> ApiResult<DocumentDetail> {
    respond(backend.document_detail(&did))
}

#[post("/documents/<did>/fields", data = "<data>", format = "application/json")]
pub async fn create_field(
    backend: &rocket::State<SharedBackend>, did: DocumentID, data: Json<NewField>,
) -> Result<Custom<Json<Field>>, ApiError> {
    respond(backend.create_field(&did, data.into_inner()))
        .map(|f| Custom(Status::Created, f))
}

#[patch("/documents/fields/<fid>", data = "<data>", format = "application/json")]
pub async fn update_field(
    backend: &rocket::State<SharedBackend>, fid: FieldID, data: Json<FieldPatch>,
) -> ApiResult<Field> {
    respond(backend.update_field(&fid, data.into_inner()))
}

#[delete("/documents/fields/<fid>")]
pub async fn delete_field(backend: &rocket::State<SharedBackend>, fid: FieldID) -> Result<Status, ApiError> {
    respond(backend.delete_field(&fid)).map(|_| Status::NoContent)
}

#[post("/documents/<did>/invite", data = "<data>", format = "application/json")]
pub async fn invite(
    backend: &rocket::State<SharedBackend>, did: DocumentID, data: Json<InviteRequest>, client_meta: ClientMeta,
) -> ApiResult<InviteResponse> {
    respond(backend.invite(&did, data.into_inner(), &client_meta))
}

#[get("/documents/<did>/sign/<sid>?<key>")]
pub async fn sign(
    backend: &rocket::State<SharedBackend>, did: DocumentID, sid: SignerID, key: String, client_meta: ClientMeta,
) -> ApiResult<SigningView> {
    respond(backend.open_signing(&did, &sid, &key, &client_meta))
}

#[post("/documents/<did>/sign/<sid>", data = "<data>", format = "application/json")]
pub async fn sign_submit(
    backend: &rocket::State<SharedBackend>, did: DocumentID, sid: SignerID, data: Json<SignSubmission>,
    client_meta: ClientMeta,
) -> ApiResult<SigningView> {
    respond(backend.submit_signing(&did, &sid, data.into_inner(), &client_meta))
}

#[post("/documents/<did>/decline/<sid>", data = "<data>", format = "application/json")]
pub async fn decline(
    backend: &rocket::State<SharedBackend>, did: DocumentID, sid: SignerID, data: Json<DeclineSubmission>,
    client_meta: ClientMeta,
) -> ApiResult<Signer> {
    respond(backend.decline(&did, &sid, data.into_inner(), &client_meta))
}

#[get("/documents/<did>/log")]
pub async fn document_log(backend: &rocket::State<SharedBackend>, did: DocumentID) -> ApiResult<Vec<LogEntry>> {
    respond(backend.log(&did))
}

#[catch(default)]
pub fn default_catcher(status: Status, _request: &rocket::Request) -> ApiError {
    api_error(status, status.reason_lossy().to_string())
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        create_document,
        documents,
        document,
        create_field,
        update_field,
        delete_field,
        invite,
        sign,
        sign_submit,
        decline,
        document_log,
    ]
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![default_catcher]
}
