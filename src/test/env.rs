#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serial_test::serial;

    use crate::env::{DEFAULT_SESSION_HOURS, Settings};

    const VARS: [&str; 4] = [
        "DATABASE_URL",
        "ABLLS_CATALOG_PATH",
        "ABLLS_REPORT_FONT",
        "SESSION_HOURS",
    ];

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        temp_env::with_vars_unset(VARS, || {
            assert_eq!(Settings::from_env(), Settings::default());
        });
    }

    #[test]
    #[serial]
    fn test_overrides_from_environment() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://custom.db")),
                ("ABLLS_CATALOG_PATH", Some(" /data/catalog.xlsx ")),
                ("ABLLS_REPORT_FONT", Some("Times-Roman")),
                ("SESSION_HOURS", Some("48")),
            ],
            || {
                let settings = Settings::from_env();
                assert_eq!(settings.database_url, "sqlite://custom.db");
                assert_eq!(settings.catalog_path, PathBuf::from("/data/catalog.xlsx"));
                assert_eq!(settings.report_font.as_deref(), Some("Times-Roman"));
                assert_eq!(settings.session_hours, 48);
            },
        );
    }

    #[test]
    #[serial]
    fn test_blank_and_invalid_values_fall_back() {
        for bad in ["", "  ", "soon", "0", "-3"] {
            temp_env::with_vars(
                [
                    ("DATABASE_URL", Some("   ")),
                    ("ABLLS_REPORT_FONT", Some("")),
                    ("SESSION_HOURS", Some(bad)),
                ],
                || {
                    let settings = Settings::from_env();
                    assert_eq!(settings.database_url, Settings::default().database_url);
                    assert_eq!(settings.report_font, None);
                    assert_eq!(settings.session_hours, DEFAULT_SESSION_HOURS);
                },
            );
        }
    }
}
