use helios::config::VehicleConfig;
use helios::vehicle::{CommandVehicleClient, VehicleChargeSource};

fn config(command: &str, args: &[&str]) -> VehicleConfig {
    VehicleConfig {
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn parses_json_printed_on_stdout() {
    let payload = r#"{"chargingState":"Charging","batteryLevel":64,"chargerPower":11,"chargerActualCurrent":16,"minutesToFullCharge":95}"#;
    let client = CommandVehicleClient::new(&config("echo", &[payload]));

    let status = client.fetch_charge_state().await.unwrap();
    assert!(status.is_charging());
    assert_eq!(status.battery_level, Some(64.0));
    assert_eq!(status.charger_power, Some(11.0));
}

#[tokio::test]
async fn nonzero_exit_is_a_fetch_error() {
    let client = CommandVehicleClient::new(&config("sh", &["-c", "echo nope >&2; exit 3"]));

    let err = client.fetch_charge_state().await.unwrap_err();
    assert!(!err.is_retriable());
    assert!(err.to_string().contains("exited"));
}

#[tokio::test]
async fn garbage_output_is_a_fetch_error() {
    let client = CommandVehicleClient::new(&config("echo", &["not json"]));

    let err = client.fetch_charge_state().await.unwrap_err();
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn missing_executable_is_retriable() {
    let client = CommandVehicleClient::new(&config("/nonexistent/helios-vehicle", &[]));

    let err = client.fetch_charge_state().await.unwrap_err();
    assert!(err.is_retriable());
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let client = CommandVehicleClient::new(&config("", &[]));
    assert!(client.fetch_charge_state().await.is_err());
}
