use std::path::Path;

use crate::error::ExportResult;
use crate::model::Meta;
use crate::writer::{write_export, FileExport};

use super::META_FILE;

pub fn write_meta(meta: &Meta, export_dir: &Path) -> ExportResult<()> {
    write_export(&export_dir.join(META_FILE), &FileExport::json(meta)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn meta_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let meta = Meta {
            version: "4.2.0-1".into(),
            created: Utc::now(),
            principal_name: "Anonymous".into(),
            web_app_prefix: None,
            cdn_label: Some("test-cdn".into()),
        };

        write_meta(&meta, tmp.path()).unwrap();

        let raw = std::fs::read(tmp.path().join("meta.json")).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["cdnLabel"], "test-cdn");
        assert_eq!(json["principalName"], "Anonymous");

        let back: Meta = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back, meta);
    }
}
