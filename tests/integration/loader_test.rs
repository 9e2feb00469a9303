use crate::utils::Fixture;
use health_unify::{Pipeline, PipelineError, load_sources};

#[test]
fn test_load_sources() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let sources = load_sources(&fixture.config())?;

    assert_eq!(sources.persons.num_rows(), 2);
    assert_eq!(sources.visits.num_rows(), 3);
    assert_eq!(sources.measurements.num_rows(), 2);
    assert!(sources.persons.has_column("Id"));
    assert!(sources.visits.has_column("ENCOUNTERCLASS"));
    Ok(())
}

#[test]
fn test_missing_persons_file_is_reported_first() {
    let fixture = Fixture::standard();
    std::fs::remove_file(fixture.path("patients.csv")).expect("remove fixture");

    let err = load_sources(&fixture.config()).unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput { ref role, .. } if role == "persons"));
    assert!(err.to_string().contains("patients.csv"));
}

/// Semicolon-delimited extracts are read and written with the same delimiter
#[test]
fn test_custom_delimiter() -> health_unify::Result<()> {
    let fixture = Fixture::with_extracts(
        "Id;GENDER;CITY\nP1;M;Boston\n",
        "Id;START;STOP;PATIENT\nV1;2019-02-17;2019-02-17;P1\n",
        "DATE;PATIENT;VALUE;Id\n2019-02-17;P1;5;O1\n",
    );
    let mut config = fixture.config();
    config.delimiter = ';';
    config.enable_database_sink = false;
    let output_path = config.output_path.clone();

    let summary = Pipeline::new(config)?.run()?;
    assert_eq!(summary.unified_rows, 1);

    // Columns without a source are reported and written empty
    assert!(summary.backfilled_columns.contains(&"ZIP".to_string()));
    assert!(summary.backfilled_columns.contains(&"Encounter_Code".to_string()));

    let written = std::fs::read_to_string(output_path)?;
    let header = written.lines().next().unwrap_or_default();
    assert!(header.starts_with("PATIENT;GENDER;BIRTHDATE;"));
    Ok(())
}
