//! Module for loading and representing delivery instances.
//!
//! An instance is a list of site labels and the symmetric matrix of physical
//! distances between them. Index 0 is always the depot; every other index is a
//! delivery site, kept in the order the table lists them.

use crate::error::DataError;
use crate::site_set::SiteSet;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Tolerance used when checking the matrix for symmetry.
const SYMMETRY_TOLERANCE: f64 = 1e-6;

/// A depot plus delivery sites and their pairwise distances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInstance {
    /// Name of the instance (file stem for loaded tables)
    pub name: String,
    /// Site labels; `labels[0]` is the depot
    pub labels: Vec<String>,
    /// Number of labels, depot included
    pub dimension: usize,
    /// Physical distances between sites
    #[serde(skip)]
    pub distance_matrix: Vec<Vec<f64>>,
}

impl DeliveryInstance {
    /// Build an instance from labels and a square distance matrix.
    ///
    /// Distances must be finite and non-negative. An asymmetric matrix is
    /// accepted but logged, since the search always reads `matrix[from][to]`.
    pub fn from_matrix(
        name: &str,
        labels: Vec<String>,
        distance_matrix: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        let n = distance_matrix.len();
        if n == 0 {
            return Err(DataError::TooFewSites { found: 0 });
        }
        if labels.len() != n {
            return Err(DataError::LabelMismatch { labels: labels.len(), size: n });
        }
        if n > SiteSet::CAPACITY {
            return Err(DataError::TooManySites { found: n, max: SiteSet::CAPACITY });
        }

        for (i, row) in distance_matrix.iter().enumerate() {
            if row.len() != n {
                return Err(DataError::NotSquare { rows: n, row: i, len: row.len() });
            }
            for (j, &d) in row.iter().enumerate() {
                if !d.is_finite() || d < 0.0 {
                    return Err(DataError::InvalidDistance {
                        from: labels[i].clone(),
                        to: labels[j].clone(),
                        value: d,
                    });
                }
            }
        }

        let asymmetric = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| (distance_matrix[i][j] - distance_matrix[j][i]).abs() > SYMMETRY_TOLERANCE)
            .count();
        if asymmetric > 0 {
            log::warn!("{}: distance matrix is asymmetric for {} pair(s)", name, asymmetric);
        }

        Ok(DeliveryInstance {
            name: name.to_string(),
            labels,
            dimension: n,
            distance_matrix,
        })
    }

    /// Load an instance from a CSV distance table, keeping at most `max_sites` labels.
    pub fn from_file<P: AsRef<Path>>(path: P, max_sites: usize) -> Result<Self, DataError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "instance".to_string());

        Self::from_reader(&name, file, max_sites)
    }

    /// Parse a CSV distance table.
    ///
    /// The first row holds the column labels (its first cell is ignored), every
    /// other row starts with its row label. Cells that are not finite numbers
    /// count as missing; rows and columns with no value at all are dropped.
    /// The retained labels are the row labels that also name a column, in row
    /// order, truncated to `max_sites`.
    pub fn from_reader<R: Read>(name: &str, reader: R, max_sites: usize) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Err(DataError::TooFewSites { found: 0 }),
        };
        let column_labels: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

        let mut rows: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for record in records {
            let record = record?;
            let label = match record.get(0) {
                Some(label) if !label.is_empty() => label.to_string(),
                _ => continue,
            };
            let values = (0..column_labels.len())
                .map(|c| record.get(c + 1).and_then(parse_cell))
                .collect();
            rows.push((label, values));
        }

        rows.retain(|(_, values)| values.iter().any(Option::is_some));

        let mut columns: HashMap<&str, usize> = HashMap::new();
        for (c, label) in column_labels.iter().enumerate() {
            if label.is_empty() || !rows.iter().any(|(_, values)| values[c].is_some()) {
                continue;
            }
            if columns.contains_key(label.as_str()) {
                log::warn!("{}: duplicate column label {:?}, keeping the first", name, label);
                continue;
            }
            columns.insert(label.as_str(), c);
        }

        let mut seen = HashSet::new();
        let mut selected: Vec<usize> = Vec::new();
        for (r, (label, _)) in rows.iter().enumerate() {
            if !columns.contains_key(label.as_str()) {
                continue;
            }
            if !seen.insert(label.as_str()) {
                log::warn!("{}: duplicate row label {:?}, keeping the first", name, label);
                continue;
            }
            selected.push(r);
        }
        selected.truncate(max_sites);

        if selected.len() < 2 {
            return Err(DataError::TooFewSites { found: selected.len() });
        }

        let labels: Vec<String> = selected.iter().map(|&r| rows[r].0.clone()).collect();
        let mut matrix = vec![vec![0.0; labels.len()]; labels.len()];
        for (i, &r) in selected.iter().enumerate() {
            for (j, label) in labels.iter().enumerate() {
                let c = columns[label.as_str()];
                matrix[i][j] = rows[r].1[c].ok_or_else(|| DataError::MissingDistance {
                    from: labels[i].clone(),
                    to: label.clone(),
                })?;
            }
        }

        log::info!("Loaded locations: {:?}", labels);
        Self::from_matrix(name, labels, matrix)
    }

    /// Random Euclidean instance: depot and `dimension - 1` sites placed uniformly
    /// in an `extent x extent` square. Deterministic via seed.
    pub fn random_euclidean(dimension: usize, extent: f64, seed: u64) -> Result<Self, DataError> {
        if !extent.is_finite() || extent <= 0.0 {
            return Err(DataError::InvalidExtent(extent));
        }
        if dimension < 2 {
            return Err(DataError::TooFewSites { found: dimension });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let points: Vec<(f64, f64)> = (0..dimension)
            .map(|_| (rng.gen_range(0.0..extent), rng.gen_range(0.0..extent)))
            .collect();

        let mut matrix = vec![vec![0.0; dimension]; dimension];
        for i in 0..dimension {
            for j in 0..dimension {
                if i != j {
                    let dx = points[i].0 - points[j].0;
                    let dy = points[i].1 - points[j].1;
                    matrix[i][j] = (dx * dx + dy * dy).sqrt();
                }
            }
        }

        let labels = std::iter::once("Depot".to_string())
            .chain((1..dimension).map(|i| format!("S{}", i)))
            .collect();
        Self::from_matrix(&format!("random-{}-{}", dimension, seed), labels, matrix)
    }

    /// Write the instance as a table `from_reader` can load back.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);

        let header = std::iter::once("").chain(self.labels.iter().map(String::as_str));
        writer.write_record(header)?;

        for (label, row) in self.labels.iter().zip(&self.distance_matrix) {
            let cells = std::iter::once(label.clone()).chain(row.iter().map(|d| format!("{:.4}", d)));
            writer.write_record(cells)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Get the distance between two sites
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[i][j]
    }

    /// Number of delivery sites (excluding depot)
    pub fn num_sites(&self) -> usize {
        self.dimension.saturating_sub(1)
    }

    pub fn label(&self, site: usize) -> &str {
        &self.labels[site]
    }

    /// Get statistics about the instance for a given drone range
    pub fn statistics(&self, drone_max_range: f64) -> InstanceStatistics {
        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.dimension {
            for j in i + 1..self.dimension {
                distances.push(self.distance(i, j));
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        let sites_in_drone_range = (1..self.dimension)
            .filter(|&i| self.distance(0, i) <= drone_max_range)
            .count();

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            avg_distance,
            max_distance,
            drone_max_range,
            sites_in_drone_range,
        }
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Statistics about a delivery instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub avg_distance: f64,
    pub max_distance: f64,
    pub drone_max_range: f64,
    pub sites_in_drone_range: usize,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Sites: {} (1 depot + {} deliveries)", self.dimension, self.dimension.saturating_sub(1))?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)?;
        writeln!(
            f,
            "  Within drone range of depot ({:.2}): {}",
            self.drone_max_range, self.sites_in_drone_range
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
,Depot,A,B,C,Notes
Depot,0,1,2,3,
A,1,0,1,2,
B,2,1,0,1,
C,3,2,1,0,
Total,,,,,
";

    #[test]
    fn test_loads_common_labels_in_row_order() {
        let instance = DeliveryInstance::from_reader("line", TABLE.as_bytes(), 8).unwrap();
        assert_eq!(instance.labels, vec!["Depot", "A", "B", "C"]);
        assert_eq!(instance.dimension, 4);
        assert_eq!(instance.num_sites(), 3);
        assert_eq!(instance.distance(0, 3), 3.0);
        assert_eq!(instance.distance(2, 1), 1.0);
    }

    #[test]
    fn test_truncates_to_max_sites() {
        let instance = DeliveryInstance::from_reader("line", TABLE.as_bytes(), 2).unwrap();
        assert_eq!(instance.labels, vec!["Depot", "A"]);
        assert_eq!(instance.distance_matrix, vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_drops_rows_without_matching_column() {
        let table = "\
,Depot,A,B
Depot,0,4,x
A,4,0,5
Z,1,1,1
";
        // B has no row, Z has no column; x is missing but sits in a column that survives.
        let instance = DeliveryInstance::from_reader("t", table.as_bytes(), 8).unwrap();
        assert_eq!(instance.labels, vec!["Depot", "A"]);
        assert_eq!(instance.distance(0, 1), 4.0);
    }

    #[test]
    fn test_missing_cell_between_used_sites_is_an_error() {
        let table = "\
,Depot,A
Depot,0,n/a
A,4,0
";
        let err = DeliveryInstance::from_reader("t", table.as_bytes(), 8).unwrap_err();
        assert!(matches!(err, DataError::MissingDistance { .. }));
    }

    #[test]
    fn test_too_few_sites() {
        let table = ",Depot\nDepot,0\n";
        let err = DeliveryInstance::from_reader("t", table.as_bytes(), 8).unwrap_err();
        assert!(matches!(err, DataError::TooFewSites { found: 1 }));

        let err = DeliveryInstance::from_reader("t", "".as_bytes(), 8).unwrap_err();
        assert!(matches!(err, DataError::TooFewSites { found: 0 }));
    }

    #[test]
    fn test_rejects_negative_distance() {
        let err = DeliveryInstance::from_matrix(
            "neg",
            vec!["D".into(), "A".into()],
            vec![vec![0.0, -1.0], vec![-1.0, 0.0]],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InvalidDistance { .. }));
    }

    #[test]
    fn test_rejects_non_square_matrix() {
        let err = DeliveryInstance::from_matrix(
            "bad",
            vec!["D".into(), "A".into()],
            vec![vec![0.0, 1.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::NotSquare { row: 1, .. }));
    }

    #[test]
    fn test_rejects_empty_matrix() {
        let err = DeliveryInstance::from_matrix("empty", Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, DataError::TooFewSites { found: 0 }));

        // depot-only is still a valid, if trivial, instance
        let depot = DeliveryInstance::from_matrix("depot", vec!["D".into()], vec![vec![0.0]]).unwrap();
        assert_eq!(depot.num_sites(), 0);
    }

    #[test]
    fn test_from_file_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urban.csv");
        std::fs::write(&path, TABLE).unwrap();

        let instance = DeliveryInstance::from_file(&path, 8).unwrap();
        assert_eq!(instance.name, "urban");
        assert_eq!(instance.dimension, 4);

        let missing = DeliveryInstance::from_file(dir.path().join("nope.csv"), 8);
        assert!(matches!(missing, Err(DataError::Open { .. })));
    }

    #[test]
    fn test_random_instance_reloads() {
        let instance = DeliveryInstance::random_euclidean(6, 10.0, 7).unwrap();
        assert_eq!(instance.dimension, 6);
        assert_eq!(instance.distance(2, 4), instance.distance(4, 2));

        let mut buffer = Vec::new();
        instance.write_csv(&mut buffer).unwrap();
        let reloaded = DeliveryInstance::from_reader("again", buffer.as_slice(), 64).unwrap();
        assert_eq!(reloaded.labels, instance.labels);
        assert!((reloaded.distance(1, 5) - instance.distance(1, 5)).abs() < 1e-3);

        assert!(DeliveryInstance::random_euclidean(6, 0.0, 7).is_err());
    }

    #[test]
    fn test_statistics() {
        let instance = DeliveryInstance::from_reader("line", TABLE.as_bytes(), 8).unwrap();
        let stats = instance.statistics(2.0);
        assert_eq!(stats.sites_in_drone_range, 2);
        assert_eq!(stats.max_distance, 3.0);
        assert!((stats.avg_distance - 10.0 / 6.0).abs() < 1e-10);
    }
}
