use std::fs;

use crate::utils::{Fixture, Output, PATIENTS_CSV};
use health_unify::schema::OUTPUT_COLUMNS;
use health_unify::{DatabaseOutcome, JoinStrategy, Pipeline, PipelineError};
use rusqlite::Connection;

/// Persons, visits and measurements combine into one row per visit-measurement pair
#[test]
fn test_unified_rows_follow_join_semantics() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let config = fixture.config();
    let output_path = config.output_path.clone();

    let summary = Pipeline::new(config)?.run()?;

    // V1 pairs with two measurements, V2 and V3 have none
    assert_eq!(summary.unified_rows, 4);
    assert_eq!(summary.integrated_visit_rows, 3);
    assert_eq!(summary.genders_filled, 1);

    let output = Output::read(&output_path);
    assert_eq!(output.header, OUTPUT_COLUMNS);
    assert_eq!(output.rows.len(), 4);

    // A person with two measurements yields two rows sharing the visit
    assert_eq!(output.column("Encounter_ID"), vec!["V1", "V1", "V2", "V3"]);
    assert_eq!(output.column("Observation_ID"), vec!["O1", "O2", "", ""]);
    assert_eq!(output.get(0, "GENDER"), "Unknown");
    assert_eq!(output.get(1, "GENDER"), "Unknown");
    assert_eq!(output.get(0, "Encounter_Type_Class"), "wellness");
    assert_eq!(output.get(0, "Encounter_Start_DateTime"), "2019-02-17T05:07:38");
    assert_eq!(output.get(0, "ENCOUNTER_DATE"), "2019-02-17");
    assert_eq!(output.get(0, "OBSERVATION_DATE"), "2019-02-17");
    assert_eq!(output.get(0, "Observation_Code"), "8302-2");
    assert_eq!(output.get(0, "Encounter_Code"), "185349003");
    assert_eq!(output.get(0, "ZIP"), "02108");
    assert_eq!(output.get(2, "ZIP"), "01970");

    // The non-numeric value is imputed with the median of the numeric ones
    let values: Vec<f64> = output.column("Observation_Value")[..2]
        .iter()
        .map(|v| v.parse().expect("numeric value"))
        .collect();
    assert_eq!(values, vec![180.0, 180.0]);

    // A visit without measurements keeps its person columns and null measurement columns
    assert_eq!(output.get(2, "GENDER"), "F");
    assert_eq!(output.get(2, "CITY"), "Salem");
    assert_eq!(output.get(2, "Observation_Value"), "");
    assert_eq!(output.get(2, "OBSERVATION_DATE"), "");

    // A visit whose person is unknown keeps the visit with null person columns
    assert_eq!(output.get(3, "PATIENT"), "P9");
    assert_eq!(output.get(3, "GENDER"), "");
    assert_eq!(output.get(3, "CITY"), "");
    assert_eq!(output.get(3, "Encounter_End_DateTime"), "");

    Ok(())
}

#[test]
fn test_database_copy_matches_output() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let config = fixture.config();
    let db_path = config.database_path.clone();
    let table_name = config.table_name.clone();

    let summary = Pipeline::new(config)?.run()?;
    assert_eq!(
        summary.database,
        DatabaseOutcome::Written {
            table: table_name.clone(),
            rows: 4
        }
    );

    let conn = Connection::open(&db_path)?;
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table_name}\""), [], |row| {
        row.get(0)
    })?;
    assert_eq!(count, 4);

    let gender: String = conn.query_row(
        &format!("SELECT GENDER FROM \"{table_name}\" WHERE Observation_ID = 'O2'"),
        [],
        |row| row.get(0),
    )?;
    assert_eq!(gender, "Unknown");

    let value: f64 = conn.query_row(
        &format!("SELECT Observation_Value FROM \"{table_name}\" WHERE Observation_ID = 'O2'"),
        [],
        |row| row.get(0),
    )?;
    assert!((value - 180.0).abs() < f64::EPSILON);

    Ok(())
}

/// Running twice on the same inputs produces the same output and table
#[test]
fn test_rerun_is_idempotent() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let config = fixture.config();
    let output_path = config.output_path.clone();
    let db_path = config.database_path.clone();
    let table_name = config.table_name.clone();

    Pipeline::new(config.clone())?.run()?;
    let first = fs::read(&output_path)?;

    let summary = Pipeline::new(config)?.run()?;
    let second = fs::read(&output_path)?;

    assert_eq!(first, second);
    assert!(matches!(summary.database, DatabaseOutcome::Written { rows: 4, .. }));

    let conn = Connection::open(&db_path)?;
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table_name}\""), [], |row| {
        row.get(0)
    })?;
    assert_eq!(count, 4);

    Ok(())
}

#[test]
fn test_missing_input_is_fatal() {
    let fixture = Fixture::standard();
    fs::remove_file(fixture.path("observations.csv")).expect("remove fixture");
    let config = fixture.config();
    let output_path = config.output_path.clone();
    let db_path = config.database_path.clone();

    let result = Pipeline::new(config).and_then(|p| p.run());

    match result {
        Err(PipelineError::MissingInput { role, .. }) => assert_eq!(role, "measurements"),
        other => panic!("expected missing input error, got {other:?}"),
    }
    assert!(!output_path.exists());
    assert!(!db_path.exists());
}

#[test]
fn test_missing_join_key_is_fatal() {
    let fixture = Fixture::standard();
    fixture.write(
        "encounters.csv",
        "Id,START,STOP,PERSON\nV1,2019-02-17T05:07:38Z,,P1\n",
    );

    let result = Pipeline::new(fixture.config()).and_then(|p| p.run());
    assert!(matches!(result, Err(PipelineError::Schema(_))));
}

/// A failing database copy is reported but leaves the delimited output in place
#[test]
fn test_database_failure_keeps_delimited_output() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let blocker = fixture.write("blocker", "not a directory");

    let mut config = fixture.config();
    config.database_path = blocker.join("health_data.db");
    let output_path = config.output_path.clone();

    let summary = Pipeline::new(config)?.run()?;

    assert!(matches!(summary.database, DatabaseOutcome::Failed { .. }));
    assert_eq!(Output::read(&output_path).rows.len(), 4);
    Ok(())
}

#[test]
fn test_disabled_database_sink() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let mut config = fixture.config();
    config.enable_database_sink = false;
    let db_path = config.database_path.clone();

    let summary = Pipeline::new(config)?.run()?;

    assert_eq!(summary.database, DatabaseOutcome::Disabled);
    assert!(!db_path.exists());
    Ok(())
}

/// With a date window, a measurement only pairs with visits close to it in time
#[test]
fn test_date_window_join() -> health_unify::Result<()> {
    let fixture = Fixture::with_extracts(
        PATIENTS_CSV,
        "\
Id,START,STOP,PATIENT,ENCOUNTERCLASS,CODE,DESCRIPTION,REASONCODE,REASONDESCRIPTION
V1,2019-02-17T05:07:38Z,2019-02-17T05:22:38Z,P1,wellness,185349003,Check up,,
V2,2020-02-17T05:07:38Z,2020-02-17T05:22:38Z,P1,wellness,185349003,Check up,,
",
        "\
DATE,PATIENT,CODE,DESCRIPTION,VALUE,UNIT,TYPE,Id
2019-02-18T09:00:00Z,P1,8302-2,Body Height,180.0,cm,numeric,O1
2020-02-17T05:07:38Z,P1,8302-2,Body Height,181.0,cm,numeric,O2
2021-01-01T00:00:00Z,P1,8302-2,Body Height,182.0,cm,numeric,O3
",
    );

    let mut config = fixture.config();
    config.enable_database_sink = false;
    config.join_strategy = JoinStrategy::DateWindow { days: 1 };
    let output_path = config.output_path.clone();

    let summary = Pipeline::new(config.clone())?.run()?;
    let output = Output::read(&output_path);

    assert_eq!(summary.unified_rows, 2);
    assert_eq!(output.column("Encounter_ID"), vec!["V1", "V2"]);
    assert_eq!(output.column("Observation_ID"), vec!["O1", "O2"]);

    // Without slack the day-after measurement no longer pairs with V1
    config.join_strategy = JoinStrategy::DateWindow { days: 0 };
    Pipeline::new(config.clone())?.run()?;
    let output = Output::read(&output_path);
    assert_eq!(output.column("Observation_ID"), vec!["", "O2"]);

    // Person-only pairing is the cross product per person
    config.join_strategy = JoinStrategy::PersonOnly;
    let summary = Pipeline::new(config)?.run()?;
    assert_eq!(summary.unified_rows, 6);

    Ok(())
}

#[test]
fn test_config_file_drives_run() -> health_unify::Result<()> {
    let fixture = Fixture::standard();
    let output_path = fixture.path("exports").join("unified.csv");
    let config_path = fixture.write(
        "unify.toml",
        &format!(
            r#"
persons_path = "{persons}"
visits_path = "{visits}"
measurements_path = "{measurements}"
output_path = "{output}"
enable_database_sink = false
show_progress = false
"#,
            persons = fixture.path("patients.csv").display(),
            visits = fixture.path("encounters.csv").display(),
            measurements = fixture.path("observations.csv").display(),
            output = output_path.display(),
        ),
    );

    let config = health_unify::PipelineConfig::from_toml_file(&config_path)?;
    let summary = Pipeline::new(config)?.run()?;

    assert_eq!(summary.unified_rows, 4);
    assert!(output_path.exists());
    Ok(())
}

/// A visit late in the evening behind UTC keeps the day and time written in the extract
#[test]
fn test_offset_timestamps_keep_local_day() -> health_unify::Result<()> {
    let fixture = Fixture::with_extracts(
        PATIENTS_CSV,
        "\
Id,START,STOP,PATIENT,ENCOUNTERCLASS,CODE,DESCRIPTION,REASONCODE,REASONDESCRIPTION
V1,2019-02-17T23:30:00-05:00,2019-02-17T23:55:00-05:00,P1,emergency,50849002,Emergency room admission,,
",
        "\
DATE,PATIENT,CODE,DESCRIPTION,VALUE,UNIT,TYPE,Id
2019-02-17T23:40:00-05:00,P1,8302-2,Body Height,180.0,cm,numeric,O1
",
    );
    let mut config = fixture.config();
    config.enable_database_sink = false;
    config.join_strategy = JoinStrategy::DateWindow { days: 0 };
    let output_path = config.output_path.clone();

    let summary = Pipeline::new(config)?.run()?;
    let output = Output::read(&output_path);

    assert_eq!(summary.unified_rows, 1);
    assert_eq!(output.get(0, "ENCOUNTER_DATE"), "2019-02-17");
    assert_eq!(output.get(0, "Encounter_Start_DateTime"), "2019-02-17T23:30:00");
    assert_eq!(output.get(0, "Encounter_End_DateTime"), "2019-02-17T23:55:00");
    assert_eq!(output.get(0, "OBSERVATION_DATE"), "2019-02-17");
    assert_eq!(output.get(0, "Observation_ID"), "O1");
    Ok(())
}

/// Fractional seconds survive in both outputs, rendered the same way
#[test]
fn test_fractional_seconds_match_across_outputs() -> health_unify::Result<()> {
    let fixture = Fixture::with_extracts(
        PATIENTS_CSV,
        "\
Id,START,STOP,PATIENT,ENCOUNTERCLASS,CODE,DESCRIPTION,REASONCODE,REASONDESCRIPTION
V1,2019-02-17T05:07:38.250Z,2019-02-17T05:22:38Z,P1,wellness,185349003,Encounter for check up,,
",
        crate::utils::OBSERVATIONS_CSV,
    );
    let config = fixture.config();
    let output_path = config.output_path.clone();
    let db_path = config.database_path.clone();
    let table_name = config.table_name.clone();

    Pipeline::new(config)?.run()?;
    let output = Output::read(&output_path);
    assert_eq!(output.get(0, "Encounter_Start_DateTime"), "2019-02-17T05:07:38.250");
    assert_eq!(output.get(0, "Encounter_End_DateTime"), "2019-02-17T05:22:38");

    let conn = Connection::open(&db_path)?;
    let (start, end): (String, String) = conn.query_row(
        &format!(
            "SELECT Encounter_Start_DateTime, Encounter_End_DateTime FROM \"{table_name}\" LIMIT 1"
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(start, output.get(0, "Encounter_Start_DateTime"));
    assert_eq!(end, output.get(0, "Encounter_End_DateTime"));

    let zip: String = conn.query_row(
        &format!("SELECT ZIP FROM \"{table_name}\" LIMIT 1"),
        [],
        |row| row.get(0),
    )?;
    assert_eq!(zip, "02108");
    Ok(())
}
