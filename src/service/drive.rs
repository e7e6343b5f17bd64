//! Google Drive v3 (metadata only).

// self
use crate::{
	_prelude::*,
	service::{self, ApiClient, Page},
};

/// Production Drive API base URL.
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";
/// Full Drive access.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
/// Access to files created or opened by the app.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
/// Read-only metadata access.
pub const DRIVE_METADATA_READONLY_SCOPE: &str =
	"https://www.googleapis.com/auth/drive.metadata.readonly";
/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Drive file resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
	/// File identifier, assigned by Google on create.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// MIME type.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mime_type: Option<String>,
	/// Parent folder identifiers.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub parents: Vec<String>,
	/// Description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Whether the file is in the trash.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub trashed: Option<bool>,
	/// Last modification instant.
	#[serde(
		default,
		with = "time::serde::rfc3339::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub modified_time: Option<OffsetDateTime>,
	/// Size in bytes; Drive encodes it as a decimal string.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<String>,
	/// Link to the file in the Drive UI.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_view_link: Option<String>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl File {
	/// Metadata for a new folder.
	pub fn folder(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			mime_type: Some(FOLDER_MIME_TYPE.into()),
			..Self::default()
		}
	}

	/// Whether this resource is a folder.
	pub fn is_folder(&self) -> bool {
		self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
	}
}

/// Filters for [`DriveService::list_files`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileQuery {
	/// Drive search expression, e.g. `name contains 'report' and trashed = false`.
	pub q: Option<String>,
	/// Partial-response selector, e.g. `files(id, name)`; `nextPageToken` is added when missing.
	pub fields: Option<String>,
	/// Sort keys, e.g. `modifiedTime desc`.
	pub order_by: Option<String>,
	/// Page size hint.
	pub page_size: Option<u32>,
	/// `user`, `drive`, or `allDrives`.
	pub corpora: Option<String>,
}
impl FileQuery {
	/// Files whose parents include `folder_id`, excluding trashed ones.
	pub fn in_folder(folder_id: &str) -> Self {
		Self {
			q: Some(format!("'{}' in parents and trashed = false", escape_literal(folder_id))),
			..Self::default()
		}
	}

	fn to_params(&self) -> Vec<(&'static str, String)> {
		let mut params = Vec::new();

		if let Some(q) = &self.q {
			params.push(("q", q.clone()));
		}
		if let Some(fields) = &self.fields {
			// Without `nextPageToken` in the selector Drive omits it and paging stops early.
			let fields = if fields.contains("nextPageToken") {
				fields.clone()
			} else {
				format!("nextPageToken, {fields}")
			};

			params.push(("fields", fields));
		}
		if let Some(order_by) = &self.order_by {
			params.push(("orderBy", order_by.clone()));
		}
		if let Some(size) = self.page_size {
			params.push(("pageSize", size.to_string()));
		}
		if let Some(corpora) = &self.corpora {
			params.push(("corpora", corpora.clone()));
		}

		params
	}
}

fn escape_literal(value: &str) -> String {
	value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
	#[serde(default)]
	files: Vec<File>,
	#[serde(default)]
	next_page_token: Option<String>,
}
impl Page for FileListPage {
	type Item = File;

	fn next_page_token(&self) -> Option<&str> {
		self.next_page_token.as_deref()
	}

	fn into_items(self) -> Vec<Self::Item> {
		self.files
	}
}

/// Drive v3 wrapper.
#[derive(Clone, Debug)]
pub struct DriveService {
	client: ApiClient,
	base: Url,
}
impl DriveService {
	/// Targets the production Drive API.
	pub fn new(client: ApiClient) -> Result<Self> {
		Self::with_base_url(client, DRIVE_BASE_URL)
	}

	/// Targets an alternative base URL (tests, proxies).
	pub fn with_base_url(client: ApiClient, base: &str) -> Result<Self> {
		Ok(Self { client, base: service::base_url(base)? })
	}

	/// Lists every file matching `query`, following pagination.
	pub async fn list_files(&self, query: &FileQuery) -> Result<Vec<File>> {
		let url = service::endpoint(&self.base, &["files"])?;

		service::collect_pages::<FileListPage>(&self.client, &url, &query.to_params()).await
	}

	/// Fetches one file's metadata.
	pub async fn get_file(&self, file_id: &str) -> Result<File> {
		let url = service::endpoint(&self.base, &["files", file_id])?;

		self.client.get_json(url, &[]).await
	}

	/// Creates a metadata-only file (folders, shortcuts, empty documents).
	pub async fn create_file(&self, file: &File) -> Result<File> {
		let url = service::endpoint(&self.base, &["files"])?;

		self.client.post_json(url, file).await
	}

	/// Permanently deletes a file, skipping the trash.
	pub async fn delete_file(&self, file_id: &str) -> Result<()> {
		let url = service::endpoint(&self.base, &["files", file_id])?;

		self.client.delete(url).await
	}
}
