pub mod bins;
pub mod lock;
pub mod process;

pub mod time {
    use anyhow::Result;
    use time::{OffsetDateTime, UtcOffset, macros::format_description};

    /// UTC stamp safe to embed in a directory name, e.g. `20240131T235959Z`.
    pub fn compact_utc(dt: OffsetDateTime) -> Result<String> {
        let fmt = format_description!("[year][month][day]T[hour][minute][second]Z");
        Ok(dt.to_offset(UtcOffset::UTC).format(fmt)?)
    }

    pub fn compact_utc_now() -> Result<String> {
        compact_utc(OffsetDateTime::now_utc())
    }

}

pub mod naming {
    pub const SEPARATOR: char = '_';

    pub fn sanitize_label(raw: &str) -> String {
        let replaced: String = raw
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { SEPARATOR })
            .collect();
        replaced.trim_matches(SEPARATOR).to_string()
    }

    pub fn export_dir_name(backup_id: i64, discriminator: &str) -> String {
        format!("{backup_id}{SEPARATOR}{discriminator}")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sanitize_replaces_and_trims() {
            assert_eq!(sanitize_label("  before spawn rework! "), "before_spawn_rework");
            assert_eq!(sanitize_label("a/b\\c:d"), "a_b_c_d");
            assert_eq!(sanitize_label("Nether-Fix #2"), "Nether_Fix__2");
        }

        #[test]
        fn sanitize_keeps_unicode_letters() {
            assert_eq!(sanitize_label("Schloß été"), "Schloß_été");
        }

        #[test]
        fn sanitize_can_be_empty() {
            assert_eq!(sanitize_label("--//--"), "");
            assert_eq!(sanitize_label(""), "");
        }

        #[test]
        fn dir_name_joins_id() {
            assert_eq!(export_dir_name(42, "daily"), "42_daily");
        }
    }
}
