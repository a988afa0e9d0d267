use crate::{
    error::{AppError, Result},
    models::followup::{AttachmentUpload, FollowUpAttachment},
    services::database::Tables,
    utils::validation::sanitize_filename,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// 已解码并校验过的附件，只保留元数据
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

/// Decodes base64 uploads and enforces the size limit. `field` names the
/// request field reported on failure.
pub fn decode_uploads(
    field: &str,
    uploads: &[AttachmentUpload],
    max_size: u64,
) -> Result<Vec<DecodedAttachment>> {
    uploads
        .iter()
        .map(|upload| {
            let content = upload.content.trim();
            // data:<mime>;base64,<payload>
            let content = match content.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
                Some((_, payload)) => payload,
                None => content,
            };

            let bytes = STANDARD
                .decode(content)
                .map_err(|_| AppError::field(field, "The submitted file is not valid base64."))?;

            let size = bytes.len() as u64;
            if size > max_size {
                return Err(AppError::field(
                    field,
                    &format!("File exceeds the maximum size of {} bytes.", max_size),
                ));
            }

            Ok(DecodedAttachment {
                filename: sanitize_filename(&upload.filename),
                mime_type: upload
                    .mime_type
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                size,
            })
        })
        .collect()
}

/// Records attachment metadata under a follow-up. Must run inside the
/// transaction that created the follow-up.
pub fn attach_to_followup(
    tables: &mut Tables,
    ticket_id: u64,
    followup_id: u64,
    attachments: &[DecodedAttachment],
) -> Result<()> {
    if attachments.is_empty() {
        return Ok(());
    }

    let ticket = tables.ticket(ticket_id)?;
    let folder = format!(
        "helpdesk/attachments/{}-{}-{}/{}",
        tables.queue(ticket.queue_id)?.slug,
        ticket.id,
        ticket.secret_key,
        followup_id
    );

    for attachment in attachments {
        let record = FollowUpAttachment {
            id: tables.next_id("attachment"),
            followup_id,
            file: format!("{}/{}", folder, attachment.filename),
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            size: attachment.size,
        };
        tables.attachments.insert(record.id, record);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content: &str) -> AttachmentUpload {
        AttachmentUpload {
            filename: filename.to_string(),
            mime_type: None,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_decode_uploads() {
        // "hello world"
        let decoded = decode_uploads("attachment", &[upload("../notes.txt", "aGVsbG8gd29ybGQ=")], 1024).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].filename, "notes.txt");
        assert_eq!(decoded[0].mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(decoded[0].size, 11);
    }

    #[test]
    fn test_decode_data_url() {
        let decoded = decode_uploads("attachment", &[upload("a.txt", "data:text/plain;base64,aGVsbG8=")], 1024).unwrap();
        assert_eq!(decoded[0].size, 5);
    }

    #[test]
    fn test_decode_rejects_bad_base64_and_oversize() {
        assert!(decode_uploads("attachment", &[upload("a.txt", "!!not base64!!")], 1024).is_err());
        assert!(decode_uploads("attachment", &[upload("a.txt", "aGVsbG8gd29ybGQ=")], 4).is_err());
    }
}
