use std::{collections::BTreeMap, fmt, str::FromStr};

use log::debug;

use crate::{
    error::{FigureError, Result},
    parse::Table,
    series,
};

/// A timed phase of one protocol round, as recorded by the benchmark harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    ConsensusStructured,
    Decrypt,
    Reconstruct,
    Sign,
    AdditionalData,
    CompleteRound,
}

/// The four phases every round goes through, in execution order.
pub const ROUND_PHASES: [Phase; 4] = [
    Phase::ConsensusStructured,
    Phase::Decrypt,
    Phase::Reconstruct,
    Phase::Sign,
];

impl Phase {
    /// Measure name the harness prefixes its columns with.
    pub fn measure(self) -> &'static str {
        match self {
            Phase::ConsensusStructured => "consensus_structured",
            Phase::Decrypt => "decrypt",
            Phase::Reconstruct => "reconstruct",
            Phase::Sign => "sign",
            Phase::AdditionalData => "additional_data",
            Phase::CompleteRound => "Complete round",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::ConsensusStructured => "Consensus structured",
            Phase::Decrypt => "Decrypt",
            Phase::Reconstruct => "Reconstruct",
            Phase::Sign => "Signature",
            Phase::AdditionalData => "Additional",
            Phase::CompleteRound => "Total",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timer {
    #[default]
    Wall,
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stat {
    #[default]
    Avg,
    Min,
    Max,
    Dev,
    Sum,
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Timer::Wall => "wall",
            Timer::User => "user",
            Timer::System => "system",
        })
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stat::Avg => "avg",
            Stat::Min => "min",
            Stat::Max => "max",
            Stat::Dev => "dev",
            Stat::Sum => "sum",
        })
    }
}

impl FromStr for Timer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Timer, String> {
        match s.to_ascii_lowercase().as_str() {
            "wall" => Ok(Timer::Wall),
            "user" => Ok(Timer::User),
            "system" => Ok(Timer::System),
            other => Err(format!("{} is not a timer (wall, user, system)", other)),
        }
    }
}

impl FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Stat, String> {
        match s.to_ascii_lowercase().as_str() {
            "avg" => Ok(Stat::Avg),
            "min" => Ok(Stat::Min),
            "max" => Ok(Stat::Max),
            "dev" => Ok(Stat::Dev),
            "sum" => Ok(Stat::Sum),
            other => Err(format!("{} is not a statistic (avg, min, max, dev, sum)", other)),
        }
    }
}

/// Which harness column to read for every phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct Column {
    pub timer: Timer,
    pub stat: Stat,
}

impl Column {
    pub fn name(&self, phase: Phase) -> String {
        format!("{}_{}_{}", phase.measure(), self.timer, self.stat)
    }
}

/// Per-phase timings, one value per x category.
#[derive(Debug, Clone)]
pub struct PhaseTimings {
    rows: usize,
    columns: BTreeMap<Phase, Vec<f64>>,
}

impl PhaseTimings {
    pub fn load(table: &Table, phases: &[Phase], column: Column) -> Result<PhaseTimings> {
        let mut columns = BTreeMap::new();
        for &phase in phases {
            let name = column.name(phase);
            columns.insert(phase, table.column(&name)?);
        }
        debug!("loaded {:?} over {} rows", phases, table.len());
        Ok(PhaseTimings {
            rows: table.len(),
            columns,
        })
    }

    pub fn from_columns(columns: Vec<(Phase, Vec<f64>)>) -> PhaseTimings {
        let rows = columns.iter().map(|(_, c)| c.len()).min().unwrap_or(0);
        PhaseTimings {
            rows,
            columns: columns.into_iter().collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get(&self, phase: Phase) -> Result<&[f64]> {
        self.columns
            .get(&phase)
            .map(|c| c.as_slice())
            .ok_or_else(|| FigureError::MissingColumn(phase.measure().to_string()))
    }

    /// Fails unless there is exactly one row per x tick.
    pub fn expect_rows(&self, expected: usize) -> Result<()> {
        if self.rows != expected {
            return Err(FigureError::RowCount {
                expected,
                found: self.rows,
            });
        }
        Ok(())
    }

    pub fn total(&self, phases: &[Phase]) -> Result<Vec<f64>> {
        let columns = phases
            .iter()
            .map(|&p| self.get(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(series::sum(&columns))
    }

    pub fn in_minutes(&self) -> PhaseTimings {
        PhaseTimings {
            rows: self.rows,
            columns: self
                .columns
                .iter()
                .map(|(p, c)| (*p, series::scale(c, 1.0 / 60.0)))
                .collect(),
        }
    }
}

#[test]
fn column_names_follow_harness_layout() {
    let column = Column::default();
    assert_eq!(column.name(Phase::Sign), "sign_wall_avg");
    assert_eq!(column.name(Phase::CompleteRound), "Complete round_wall_avg");

    let column = Column {
        timer: Timer::User,
        stat: Stat::Max,
    };
    assert_eq!(column.name(Phase::Decrypt), "decrypt_user_max");
}

#[test]
fn timer_and_stat_parse() {
    assert_eq!("System".parse::<Timer>(), Ok(Timer::System));
    assert_eq!("dev".parse::<Stat>(), Ok(Stat::Dev));
    assert!("median".parse::<Stat>().is_err());
}

#[test]
fn loads_phases_from_table() {
    let csv = "hosts,consensus_structured_wall_avg,decrypt_wall_avg,Reconstruct_wall_avg,Sign_wall_avg\n\
               7,1,2,3,4\n\
               16,2,4,6,8\n";
    let table = Table::from_reader(csv.as_bytes()).unwrap();
    let timings = PhaseTimings::load(&table, &ROUND_PHASES, Column::default()).unwrap();
    assert_eq!(timings.rows(), 2);
    assert_eq!(timings.get(Phase::Reconstruct).unwrap(), &[3.0, 6.0]);
    assert_eq!(timings.total(&ROUND_PHASES).unwrap(), vec![10.0, 20.0]);
}

#[test]
fn missing_phase_column_fails() {
    let table = Table::from_reader("decrypt_wall_avg\n1\n".as_bytes()).unwrap();
    let err = PhaseTimings::load(&table, &ROUND_PHASES, Column::default()).unwrap_err();
    assert!(matches!(err, FigureError::MissingColumn(name) if name == "consensus_structured_wall_avg"));
}

#[test]
fn row_count_must_match_ticks() {
    let timings = PhaseTimings::from_columns(vec![(Phase::Sign, vec![1.0, 2.0])]);
    assert!(timings.expect_rows(2).is_ok());
    assert!(matches!(
        timings.expect_rows(6),
        Err(FigureError::RowCount { expected: 6, found: 2 })
    ));
}

#[test]
fn minutes_divide_by_sixty() {
    let timings = PhaseTimings::from_columns(vec![(Phase::Sign, vec![120.0, 30.0])]);
    assert_eq!(timings.in_minutes().get(Phase::Sign).unwrap(), &[2.0, 0.5]);
}
