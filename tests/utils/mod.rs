use std::fs;
use std::path::{Path, PathBuf};

use health_unify::PipelineConfig;
use tempfile::TempDir;

/// Person extract: P1 has no recorded gender, P2 has no measurements
pub const PATIENTS_CSV: &str = "\
Id,BIRTHDATE,SSN,GENDER,RACE,ETHNICITY,MARITAL,COUNTY,STATE,CITY,ZIP
P1,1980-01-01,999-10-1111,,white,nonhispanic,M,Suffolk County,Massachusetts,Boston,02108
P2,1990-05-05,999-20-2222,F,asian,nonhispanic,S,Essex County,Massachusetts,Salem,01970
";

/// Visit extract: V3 belongs to a person missing from the person extract
pub const ENCOUNTERS_CSV: &str = "\
Id,START,STOP,PATIENT,ENCOUNTERCLASS,CODE,DESCRIPTION,REASONCODE,REASONDESCRIPTION
V1,2019-02-17T05:07:38Z,2019-02-17T05:22:38Z,P1,wellness,185349003,Encounter for check up,,
V2,2020-03-01T10:00:00Z,2020-03-01T11:00:00Z,P2,ambulatory,185345009,Encounter for symptom,444814009,Viral sinusitis
V3,2020-06-01T10:00:00Z,,P9,emergency,50849002,Emergency room admission,,
";

/// Measurement extract: two measurements for P1, one of them non-numeric
pub const OBSERVATIONS_CSV: &str = "\
DATE,PATIENT,ENCOUNTER,CODE,DESCRIPTION,VALUE,UNIT,TYPE,Id
2019-02-17T05:07:38Z,P1,V1,8302-2,Body Height,180.0,cm,numeric,O1
2019-02-17T05:07:38Z,P1,V1,72166-2,Tobacco smoking status,Never smoker,{nominal},text,O2
";

/// A temporary data directory holding the three extracts
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Directory with the default extracts written under their standard names
    #[must_use]
    pub fn standard() -> Self {
        Self::with_extracts(PATIENTS_CSV, ENCOUNTERS_CSV, OBSERVATIONS_CSV)
    }

    #[must_use]
    pub fn with_extracts(patients: &str, encounters: &str, observations: &str) -> Self {
        let fixture = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        fixture.write("patients.csv", patients);
        fixture.write("encounters.csv", encounters);
        fixture.write("observations.csv", observations);
        fixture
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("write fixture file");
        path
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Configuration reading and writing inside the fixture directory
    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            show_progress: false,
            ..PipelineConfig::from_data_dir(self.dir.path())
        }
    }
}

/// Delimited output split into its header and rows
///
/// Fixture values contain no delimiters or quotes, so a plain split is exact.
pub struct Output {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Output {
    pub fn read(path: &Path) -> Self {
        let content = fs::read_to_string(path).expect("read output file");
        let mut lines = content.lines();
        let header = split(lines.next().expect("header row"));
        let rows = lines.map(split).collect();
        Self { header, rows }
    }

    /// Value of `column` in row `row`
    pub fn get(&self, row: usize, column: &str) -> &str {
        let idx = self
            .header
            .iter()
            .position(|c| c == column)
            .unwrap_or_else(|| panic!("column {column} not in output"));
        &self.rows[row][idx]
    }

    pub fn column(&self, column: &str) -> Vec<&str> {
        (0..self.rows.len()).map(|row| self.get(row, column)).collect()
    }
}

fn split(line: &str) -> Vec<String> {
    line.split(',').map(str::to_string).collect()
}
