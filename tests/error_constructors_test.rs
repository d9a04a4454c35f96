use helios::error::HeliosError;

#[test]
fn constructors_produce_matching_variants() {
    assert!(matches!(
        HeliosError::config("x"),
        HeliosError::Config { .. }
    ));
    assert!(matches!(
        HeliosError::config_missing("x"),
        HeliosError::ConfigMissing { .. }
    ));
    assert!(matches!(
        HeliosError::fetch("x"),
        HeliosError::Fetch {
            retriable: false,
            ..
        }
    ));
    assert!(matches!(
        HeliosError::fetch_retriable("x"),
        HeliosError::Fetch {
            retriable: true,
            ..
        }
    ));
    assert!(matches!(
        HeliosError::persistence("x"),
        HeliosError::Persistence { .. }
    ));
    assert!(matches!(HeliosError::io("x"), HeliosError::Io { .. }));
    assert!(matches!(
        HeliosError::generic("x"),
        HeliosError::Generic { .. }
    ));
}

#[test]
fn display_messages_name_the_failure() {
    assert_eq!(
        HeliosError::fetch("boom").to_string(),
        "Fetch error: boom"
    );
    assert_eq!(
        HeliosError::NoCurrentData.to_string(),
        "No current price data available"
    );
    assert_eq!(
        HeliosError::NoTodayData.to_string(),
        "No price data for today"
    );
    assert_eq!(
        HeliosError::config_missing("jobs not started").to_string(),
        "Configuration missing: jobs not started"
    );
}

#[test]
fn conversion_from_io_and_json_errors() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(HeliosError::from(io_err), HeliosError::Io { .. }));

    let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    assert!(matches!(
        HeliosError::from(json_err),
        HeliosError::Serialization { .. }
    ));
}
