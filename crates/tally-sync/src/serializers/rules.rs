use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{ExportError, ExportResult};
use crate::model::Rules;
use crate::writer::{write_export, FileExport};

use super::{LEGACY_RULES_DIR, LEGACY_RULES_FILE, RULES_DIR, RULES_FILE};

/// Legacy rule source bundled with the crate.
pub const EMBEDDED_LEGACY_RULES: &str = include_str!("../../resources/default-rules.js");

/// Where the deprecated `rules/default-rules.js` comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LegacyRules {
    #[default]
    Embedded,
    File(PathBuf),
}

impl LegacyRules {
    pub fn from_override(path: Option<&Path>) -> Self {
        path.map_or(Self::Embedded, |p| Self::File(p.to_path_buf()))
    }

    pub fn read(&self) -> ExportResult<Cow<'static, str>> {
        match self {
            Self::Embedded => Ok(Cow::Borrowed(EMBEDDED_LEGACY_RULES)),
            Self::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| ExportError::LegacyRules {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Current rules under `rules2/rules.js`, plus the legacy copy under
/// `rules/default-rules.js` for importers that only know the old path.
pub fn write_rules(rules: &Rules, legacy: &LegacyRules, export_dir: &Path) -> ExportResult<()> {
    let current = export_dir.join(RULES_DIR).join(RULES_FILE);
    write_export(&current, &FileExport::text(rules.rules.as_str()))?;

    let legacy_rules = legacy.read()?;
    let old = export_dir.join(LEGACY_RULES_DIR).join(LEGACY_RULES_FILE);
    write_export(&old, &FileExport::text(legacy_rules))
}
