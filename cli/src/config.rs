//! Host configuration, read from TOML. Every field has a default, so an
//! empty file (or none at all) gives the stock rig setup.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use gastrack_calc::{Calibration, CalibrationTable, Estimator, Position, SensorGeometry, DEFAULT_EPSILON};
use gastrack_format::MODULE_COUNT;
use serde::Deserialize;

use crate::consts;
use crate::error::{Error, Result};
use crate::link::ConnectOptions;
use crate::orchestrator::CycleTimings;
use crate::report::FrameProcessor;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub address: SocketAddr,
    pub connect: ConnectConfig,
    pub cycle: CycleConfig,
    pub estimator: EstimatorConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectConfig {
    pub timeout_secs: f64,
    pub backoff_secs: f64,
    pub max_attempts: Option<u32>,
    pub response_timeout_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    pub settle_secs: f64,
    pub between_scans_secs: f64,
    pub rest_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    pub epsilon: f64,
    /// Module positions as `[x, y]`, indexed by module number
    pub positions: [[i32; 2]; MODULE_COUNT],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    pub modules: [ModuleCalibration; MODULE_COUNT],
    /// `[row, column]` of the cell each module is read at
    pub reference_cell: [usize; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleCalibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: consts::default_address(),
            connect: ConnectConfig::default(),
            cycle: CycleConfig::default(),
            estimator: EstimatorConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout_secs: consts::CONNECT_TIMEOUT.as_secs_f64(),
            backoff_secs: consts::CONNECT_BACKOFF.as_secs_f64(),
            max_attempts: None,
            response_timeout_secs: consts::RESPONSE_TIMEOUT.as_secs_f64(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            settle_secs: consts::SETTLE.as_secs_f64(),
            between_scans_secs: consts::BETWEEN_SCANS.as_secs_f64(),
            rest_secs: consts::REST.as_secs_f64(),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            positions: SensorGeometry::default().positions().map(|p| [p.x, p.y]),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let table = CalibrationTable::default();
        let (row, column) = table.reference_cell();
        Self {
            modules: table.modules().map(|c| ModuleCalibration {
                slope: c.slope,
                intercept: c.intercept,
            }),
            reference_cell: [row, column],
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.connect_options()?;
        self.timings()?;
        self.processor()?;
        Ok(())
    }

    pub fn connect_options(&self) -> Result<ConnectOptions> {
        let connect = &self.connect;
        if connect.max_attempts == Some(0) {
            return Err(Error::Config("connect.max_attempts must be at least 1".into()));
        }
        let timeout = duration("connect.timeout_secs", connect.timeout_secs)?;
        if timeout.is_zero() {
            return Err(Error::Config("connect.timeout_secs must be positive".into()));
        }
        Ok(ConnectOptions {
            address: self.address,
            timeout,
            backoff: duration("connect.backoff_secs", connect.backoff_secs)?,
            max_attempts: connect.max_attempts,
            response_timeout: duration("connect.response_timeout_secs", connect.response_timeout_secs)?,
        })
    }

    pub fn timings(&self) -> Result<CycleTimings> {
        Ok(CycleTimings {
            settle: duration("cycle.settle_secs", self.cycle.settle_secs)?,
            between_scans: duration("cycle.between_scans_secs", self.cycle.between_scans_secs)?,
            rest: duration("cycle.rest_secs", self.cycle.rest_secs)?,
        })
    }

    pub fn processor(&self) -> Result<FrameProcessor> {
        let positions = self.estimator.positions.map(|[x, y]| Position::new(x, y));
        if positions.iter().all(|p| *p == Position::ORIGIN) {
            return Err(Error::Config(
                "estimator.positions: every module sits at the origin".into(),
            ));
        }
        let epsilon = self.estimator.epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(Error::Config(format!("estimator.epsilon must be >= 0, got {}", epsilon)));
        }

        let [row, column] = self.calibration.reference_cell;
        let modules = self.calibration.modules.map(|m| Calibration {
            slope: m.slope,
            intercept: m.intercept,
        });
        let calibration = CalibrationTable::new(modules, row, column).ok_or_else(|| {
            Error::Config(format!(
                "calibration.reference_cell [{}, {}] is outside the module grid",
                row, column
            ))
        })?;

        Ok(FrameProcessor::new(
            calibration,
            Estimator::with_epsilon(SensorGeometry::new(positions), epsilon),
        ))
    }
}

fn duration(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::Config(format!("{} must be a non-negative number of seconds, got {}", field, secs)))
}
