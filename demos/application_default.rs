//! Resolves application-default credentials and lists a few Drive files.
//!
//! Run `gcloud auth application-default login --scopes=openid,https://www.googleapis.com/auth/drive.metadata.readonly`
//! first, point `GOOGLE_APPLICATION_CREDENTIALS` at a key file, or run on Google Cloud.

// crates.io
use color_eyre::Result;
// self
use google_api_kit::{
	credential::{AdcEnvironment, Credential},
	service::{ApiClient, DRIVE_METADATA_READONLY_SCOPE, DriveService, FileQuery},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let env = AdcEnvironment::from_env();

	if let Some(path) = env.well_known_file() {
		println!("gcloud credentials would be read from {}.", path.display());
	}

	let credential = Credential::application_default_with(&env)
		.await?
		.with_scopes([DRIVE_METADATA_READONLY_SCOPE])?;

	println!("Resolved {:?} credentials.", credential.kind());

	if let Some(email) = credential.service_account_email() {
		println!("Acting as {email}.");
	}

	let drive = DriveService::new(ApiClient::new(credential))?;
	let query = FileQuery {
		fields: Some("nextPageToken, files(id, name, mimeType)".into()),
		page_size: Some(20),
		order_by: Some("modifiedTime desc".into()),
		..FileQuery::default()
	};

	for file in drive.list_files(&query).await?.into_iter().take(20) {
		let kind = if file.is_folder() { "dir " } else { "file" };

		println!("{kind} {} {}", file.id.unwrap_or_default(), file.name.unwrap_or_default());
	}

	Ok(())
}
