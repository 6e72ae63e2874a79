//! Test and image record commands.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::cli::args::{ImageCommand, TestCommand};
use crate::daemon::ensure_daemon;
use crate::daemon::protocol::SaveImageRequest;
use crate::error::{ParascopeError, Result};
use crate::models::{SampleKind, TestKind, TestRecord};
use crate::output::table;

/// Handle test record commands
pub async fn test(command: TestCommand, json: bool) -> Result<()> {
    match command {
        TestCommand::Add {
            patient,
            name,
            kind,
            smear,
            result,
            taken_by,
        } => {
            let kind: TestKind = kind.parse().map_err(ParascopeError::InvalidArgument)?;
            let record = TestRecord {
                id: String::new(),
                patient_id: patient,
                name,
                kind,
                smear,
                date: chrono::Utc::now().to_rfc3339(),
                result,
                taken_by,
            };

            let mut client = ensure_daemon().await?;
            let stored = client.save_test(record).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else {
                println!("Recorded test {}.", stored.id);
            }
            Ok(())
        }

        TestCommand::List { patient } => {
            let mut client = ensure_daemon().await?;
            let tests = client.list_tests(patient.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&tests)?);
            } else {
                print!("{}", table::format_tests(&tests));
            }
            Ok(())
        }
    }
}

/// Handle image record commands
pub async fn image(command: ImageCommand, json: bool) -> Result<()> {
    match command {
        ImageCommand::Save { test, kind, file } => {
            let kind: SampleKind = kind.parse().map_err(ParascopeError::InvalidArgument)?;
            let bytes = std::fs::read(&file)?;

            let mut client = ensure_daemon().await?;
            let record = client
                .save_image(SaveImageRequest {
                    test_id: test,
                    kind,
                    data: BASE64.encode(&bytes),
                })
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("Saved image to {}.", record.path);
            }
            Ok(())
        }

        ImageCommand::List { test } => {
            let mut client = ensure_daemon().await?;
            let images = client.list_images(test.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&images)?);
            } else {
                print!("{}", table::format_images(&images));
            }
            Ok(())
        }
    }
}
