/// Live integration tests against the survey feature service and the
/// results database
///
/// Tests verify:
/// 1. The portal item resolves to a feature service with the configured layers
/// 2. Each feature set can be paged through and parsed into records
/// 3. A result table can be replaced in PostgreSQL and read back
///
/// Prerequisites:
/// - Internet access to www.arcgis.com
/// - SEABIRD_DATABASE_URL set in .env pointing at a scratch database
///
/// Run with: cargo test --test feature_service_integration -- --ignored --test-threads=1

use seabird_results::config::SourceConfig;
use seabird_results::ingest::FeatureSource;
use seabird_results::ingest::arcgis::FeatureService;
use seabird_results::model::DisturbanceResult;
use seabird_results::schema::TableData;
use seabird_results::sink::ResultSink;
use seabird_results::sink::postgres::PostgresSink;
use postgres::{Client, NoTls};
use std::env;

fn connect_service() -> FeatureService {
    FeatureService::connect(&SourceConfig::default()).expect("Failed to resolve feature service")
}

#[test]
#[ignore]
fn test_surveys_layer_returns_records() {
    let service = connect_service();
    let surveys = service.surveys().expect("Survey query failed");

    assert!(!surveys.is_empty(), "Survey layer returned no records");
    for survey in surveys.iter().take(20) {
        assert!(!survey.globalid.is_empty());
        assert!(!survey.survey_area.is_empty());
    }
    println!("✓ {} survey records", surveys.len());
}

#[test]
#[ignore]
fn test_child_tables_reference_surveys() {
    let service = connect_service();
    let observations = service.observations().expect("Observation query failed");
    let events = service.events().expect("Event query failed");

    assert!(!observations.is_empty(), "Observation table returned no records");
    let with_parent = observations
        .iter()
        .filter(|o| o.parentglobalid.is_some())
        .count();
    assert!(with_parent > 0, "No observation carries a parentglobalid");
    println!("✓ {} observations, {} events", observations.len(), events.len());
}

#[test]
#[ignore]
fn test_small_page_size_pages_through_layer() {
    let config = SourceConfig {
        page_size: 50,
        ..SourceConfig::default()
    };
    let paged = FeatureService::connect(&config)
        .expect("Failed to resolve feature service")
        .surveys()
        .expect("Paged survey query failed");
    let unpaged = connect_service().surveys().expect("Survey query failed");

    assert_eq!(paged.len(), unpaged.len());
}

#[test]
#[ignore]
fn test_replace_table_round_trip() {
    dotenv::dotenv().ok();
    let database_url = env::var("SEABIRD_DATABASE_URL").expect("SEABIRD_DATABASE_URL must be set");

    let mut table = TableData::from_rows(&[DisturbanceResult {
        group_name: "test".to_string(),
        survey_area: "test_area".to_string(),
        year: 1999,
        disturbs_per_day: None,
    }]);
    table.name = "Disturb_Results_itest".to_string();

    let mut sink = PostgresSink::connect(&database_url).expect("Failed to connect to database");
    assert_eq!(sink.replace_table(&table).unwrap(), 1);
    assert_eq!(sink.replace_table(&table).unwrap(), 1);

    let mut client = Client::connect(&database_url, NoTls).unwrap();
    let rows = client
        .query("SELECT year, disturbs_per_day FROM \"Disturb_Results_itest\"", &[])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<_, i32>(0), 1999);
    assert_eq!(rows[0].get::<_, Option<f64>>(1), None);

    client
        .batch_execute("DROP TABLE \"Disturb_Results_itest\"")
        .unwrap();
}
