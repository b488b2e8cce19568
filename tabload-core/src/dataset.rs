//! The two supported datasets and their fixed rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;
use crate::transform::{TransformPipeline, TransformStep};

/// A dataset handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Flower measurements: four numeric columns and a species label.
    Iris,
    /// Passenger manifest: numeric, categorical and boolean-like columns.
    Titanic,
}

const IRIS_NUMERIC: &[&str] = &["sepal_length", "sepal_width", "petal_length", "petal_width"];
const IRIS_REQUIRED: &[&str] = &[
    "sepal_length",
    "sepal_width",
    "petal_length",
    "petal_width",
    "species",
];

const TITANIC_NUMERIC: &[&str] = &["age", "fare", "sibsp", "parch"];
const TITANIC_CATEGORICAL: &[&str] = &[
    "sex",
    "embarked",
    "class",
    "who",
    "deck",
    "embark_town",
    "alive",
    "alone",
];
const TITANIC_FLAGS: &[&str] = &["adult_male", "alone", "is_adult"];

const IRIS_COLUMNS: &[(&str, ColumnType)] = &[
    ("sepal_length", ColumnType::Float),
    ("sepal_width", ColumnType::Float),
    ("petal_length", ColumnType::Float),
    ("petal_width", ColumnType::Float),
    ("species", ColumnType::Text),
    ("sepal_ratio", ColumnType::Float),
    ("petal_ratio", ColumnType::Float),
    ("is_petal_long", ColumnType::Integer),
];

const TITANIC_COLUMNS: &[(&str, ColumnType)] = &[
    ("survived", ColumnType::Integer),
    ("pclass", ColumnType::Integer),
    ("sex", ColumnType::Text),
    ("age", ColumnType::Float),
    ("sibsp", ColumnType::Integer),
    ("parch", ColumnType::Integer),
    ("fare", ColumnType::Float),
    ("embarked", ColumnType::Text),
    ("class", ColumnType::Text),
    ("who", ColumnType::Text),
    ("adult_male", ColumnType::Integer),
    ("deck", ColumnType::Text),
    ("embark_town", ColumnType::Text),
    ("alive", ColumnType::Text),
    ("alone", ColumnType::Integer),
    ("is_adult", ColumnType::Integer),
    ("fare_per_person", ColumnType::Float),
];

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Iris, Dataset::Titanic];

    pub fn name(self) -> &'static str {
        match self {
            Dataset::Iris => "iris",
            Dataset::Titanic => "titanic",
        }
    }

    /// Remote table the staged rows go to unless overridden.
    pub fn default_table(self) -> &'static str {
        match self {
            Dataset::Iris => "iris_data",
            Dataset::Titanic => "titanic_data",
        }
    }

    pub fn staged_file_name(self) -> &'static str {
        match self {
            Dataset::Iris => "iris_transformed.csv",
            Dataset::Titanic => "titanic_transformed.csv",
        }
    }

    pub fn raw_file_name(self) -> &'static str {
        match self {
            Dataset::Iris => "iris.csv",
            Dataset::Titanic => "titanic.csv",
        }
    }

    /// Public mirror the raw file can be downloaded from.
    pub fn source_url(self) -> &'static str {
        match self {
            Dataset::Iris => "https://raw.githubusercontent.com/mwaskom/seaborn-data/master/iris.csv",
            Dataset::Titanic => {
                "https://raw.githubusercontent.com/mwaskom/seaborn-data/master/titanic.csv"
            }
        }
    }

    /// Raw columns without which the dataset cannot be transformed.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Dataset::Iris => IRIS_REQUIRED,
            Dataset::Titanic => TITANIC_NUMERIC,
        }
    }

    /// Columns of the remote table, excluding the generated `id` key.
    pub fn remote_columns(self) -> &'static [(&'static str, ColumnType)] {
        match self {
            Dataset::Iris => IRIS_COLUMNS,
            Dataset::Titanic => TITANIC_COLUMNS,
        }
    }

    /// Imputation and derivation rules, in application order.
    pub fn pipeline(self) -> TransformPipeline {
        match self {
            Dataset::Iris => TransformPipeline::new()
                .add_step(TransformStep::FillMedian {
                    columns: owned(IRIS_NUMERIC),
                    optional: false,
                })
                .add_step(TransformStep::FillMode {
                    columns: owned(&["species"]),
                    optional: false,
                })
                .add_step(TransformStep::Ratio {
                    numerator: "sepal_length".into(),
                    denominator: "sepal_width".into(),
                    output: "sepal_ratio".into(),
                })
                .add_step(TransformStep::Ratio {
                    numerator: "petal_length".into(),
                    denominator: "petal_width".into(),
                    output: "petal_ratio".into(),
                })
                .add_step(TransformStep::AboveMedian {
                    column: "petal_length".into(),
                    output: "is_petal_long".into(),
                }),
            // is_adult is derived from age and then passed through the flag
            // normalization with the genuinely boolean-like columns. The second
            // pass maps 1 -> 1 and 0 -> 0; reordering these steps changes that.
            Dataset::Titanic => TransformPipeline::new()
                .add_step(TransformStep::FillMedian {
                    columns: owned(TITANIC_NUMERIC),
                    optional: false,
                })
                .add_step(TransformStep::FillMode {
                    columns: owned(TITANIC_CATEGORICAL),
                    optional: true,
                })
                .add_step(TransformStep::AtLeast {
                    column: "age".into(),
                    threshold: 18.0,
                    output: "is_adult".into(),
                })
                .add_step(TransformStep::PerMember {
                    numerator: "fare".into(),
                    members: owned(&["sibsp", "parch"]),
                    output: "fare_per_person".into(),
                })
                .add_step(TransformStep::TruthyFlag {
                    columns: owned(TITANIC_FLAGS),
                    optional: true,
                }),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iris" => Ok(Dataset::Iris),
            "titanic" => Ok(Dataset::Titanic),
            other => Err(format!(
                "unknown dataset '{other}' (expected one of: iris, titanic)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_roundtrip() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.name().parse::<Dataset>().unwrap(), dataset);
        }
        assert_eq!("Titanic".parse::<Dataset>().unwrap(), Dataset::Titanic);
        assert!("penguins".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_derived_columns_are_remote_columns() {
        for dataset in Dataset::ALL {
            let remote: Vec<&str> = dataset.remote_columns().iter().map(|(n, _)| *n).collect();
            for step in dataset.pipeline().steps {
                let output = match step {
                    TransformStep::Ratio { output, .. }
                    | TransformStep::AboveMedian { output, .. }
                    | TransformStep::AtLeast { output, .. }
                    | TransformStep::PerMember { output, .. } => output,
                    _ => continue,
                };
                assert!(remote.contains(&output.as_str()), "{dataset}: {output}");
            }
        }
    }

    #[test]
    fn test_titanic_flags_run_after_derivation() {
        let steps = Dataset::Titanic.pipeline().steps;
        let derive = steps
            .iter()
            .position(|s| matches!(s, TransformStep::AtLeast { .. }))
            .unwrap();
        let flags = steps
            .iter()
            .position(|s| matches!(s, TransformStep::TruthyFlag { .. }))
            .unwrap();
        assert!(derive < flags);
    }
}
