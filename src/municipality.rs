//! Municipality and regional-history lookups
//!
//! Both lookups are injected into the calculator so that deployments can
//! extend or replace them without touching the scoring code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::MunicipalityEntry;

/// Historical factor for a UF without recorded data
pub const DEFAULT_HISTORICAL_FACTOR: f64 = 0.5;

const BUILTIN_MUNICIPALITIES: &[(&str, &str, &str)] = &[
    ("4106902", "Curitiba", "PR"),
    ("3550308", "São Paulo", "SP"),
    ("3304557", "Rio de Janeiro", "RJ"),
    ("2927408", "Salvador", "BA"),
    ("2304400", "Fortaleza", "CE"),
    ("1302603", "Manaus", "AM"),
    ("5300108", "Brasília", "DF"),
    ("1501402", "Belém", "PA"),
    ("2611606", "Recife", "PE"),
    ("4314902", "Porto Alegre", "RS"),
];

/// Disaster incidence per UF on a 0-1 scale (SINPDEC records 2010-2023)
const HISTORICAL_FACTORS: &[(&str, f64)] = &[
    ("RJ", 0.9),
    ("SP", 0.7),
    ("SC", 0.85),
    ("MG", 0.6),
    ("BA", 0.5),
    ("PE", 0.6),
    ("AL", 0.7),
    ("ES", 0.65),
    ("PR", 0.55),
];

/// A municipality identified by its IBGE code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Municipality {
    pub code: String,
    pub name: String,
    pub uf: String,
}

impl From<&MunicipalityEntry> for Municipality {
    fn from(entry: &MunicipalityEntry) -> Self {
        Self {
            code: entry.code.trim().to_string(),
            name: entry.name.trim().to_string(),
            uf: entry.uf.trim().to_uppercase(),
        }
    }
}

/// Lookup of municipality names by regional code
pub trait MunicipalityDirectory: Send + Sync {
    fn lookup(&self, code: &str) -> Option<Municipality>;
}

/// Lookup of the historical disaster factor of a UF
pub trait HistoricalRiskSource: Send + Sync {
    /// Factor in `[0, 1]`, falling back to a neutral value for unknown UFs
    fn historical_factor(&self, uf: &str) -> f64;
}

/// Directory held in memory, seeded with the state capitals
#[derive(Debug, Clone)]
pub struct InMemoryDirectory {
    entries: HashMap<String, Municipality>,
}

impl InMemoryDirectory {
    /// Empty directory
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Directory with the built-in capitals plus `extra` entries
    ///
    /// Extra entries override built-in ones with the same code.
    #[must_use]
    pub fn with_entries(extra: &[MunicipalityEntry]) -> Self {
        let mut directory = Self::default();
        for entry in extra {
            directory.insert(entry.into());
        }
        directory
    }

    pub fn insert(&mut self, municipality: Municipality) {
        self.entries.insert(municipality.code.clone(), municipality);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        let mut directory = Self::empty();
        for (code, name, uf) in BUILTIN_MUNICIPALITIES {
            directory.insert(Municipality {
                code: (*code).to_string(),
                name: (*name).to_string(),
                uf: (*uf).to_string(),
            });
        }
        directory
    }
}

impl MunicipalityDirectory for InMemoryDirectory {
    fn lookup(&self, code: &str) -> Option<Municipality> {
        self.entries.get(code.trim()).cloned()
    }
}

/// Fixed per-UF historical factor table
#[derive(Debug, Clone)]
pub struct HistoricalRiskTable {
    factors: HashMap<String, f64>,
    default_factor: f64,
}

impl HistoricalRiskTable {
    #[must_use]
    pub fn new(factors: HashMap<String, f64>, default_factor: f64) -> Self {
        Self {
            factors,
            default_factor,
        }
    }
}

impl Default for HistoricalRiskTable {
    fn default() -> Self {
        Self::new(
            HISTORICAL_FACTORS
                .iter()
                .map(|(uf, factor)| ((*uf).to_string(), *factor))
                .collect(),
            DEFAULT_HISTORICAL_FACTOR,
        )
    }
}

impl HistoricalRiskSource for HistoricalRiskTable {
    fn historical_factor(&self, uf: &str) -> f64 {
        self.factors
            .get(&uf.trim().to_uppercase())
            .copied()
            .unwrap_or(self.default_factor)
    }
}
