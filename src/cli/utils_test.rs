use crate::cli::error::CliError;
use crate::cli::utils::*;

#[test]
fn test_parse_format() {
    assert_eq!(parse_format("table").unwrap(), OutputFormat::Table);
    assert_eq!(parse_format("json").unwrap(), OutputFormat::Json);
}

#[test]
fn test_parse_format_rejects_unknown() {
    let result = parse_format("yaml");

    assert!(matches!(
        result,
        Err(CliError::InvalidFormat { ref format }) if format == "yaml"
    ));
}

#[test]
fn test_or_dash() {
    assert_eq!(or_dash(Some("origin")), "origin");
    assert_eq!(or_dash(None::<String>), "-");
    assert_eq!(or_dash(Some(3)), "3");
}

#[test]
fn test_format_time_absent() {
    assert_eq!(format_time(None), "-");
}

#[test]
fn test_yes_no() {
    assert_eq!(yes_no(true), "yes");
    assert_eq!(yes_no(false), "no");
}
