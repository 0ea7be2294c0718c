use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::time::Duration;

/// A single statistic reported by MiniZinc or the solver.
#[derive(Clone, Debug, PartialEq)]
pub enum Statistic {
    Int(i64),
    Float(f64),
    /// Timing statistics, reported by MiniZinc in seconds.
    Duration(Duration),
    Text(String),
}

impl Statistic {
    fn parse(key: &str, value: &str) -> Statistic {
        let value = value.trim();

        if key == "time" || key.ends_with("Time") {
            if let Ok(seconds) = value.parse::<f64>() {
                if seconds.is_finite() && seconds >= 0.0 {
                    return Statistic::Duration(Duration::from_secs_f64(seconds));
                }
            }
        }

        if let Ok(int) = value.parse::<i64>() {
            Statistic::Int(int)
        } else if let Ok(float) = value.parse::<f64>() {
            Statistic::Float(float)
        } else {
            Statistic::Text(value.trim_matches('"').to_owned())
        }
    }
}

impl Display for Statistic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Statistic::Int(value) => write!(f, "{value}"),
            Statistic::Float(value) => write!(f, "{value}"),
            Statistic::Duration(duration) => write!(f, "{}", duration.as_secs_f64()),
            Statistic::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

/// The statistics collected during a solve, by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    values: BTreeMap<String, Statistic>,
}

impl Statistics {
    pub fn get(&self, key: &str) -> Option<&Statistic> {
        self.values.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Statistic> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record a `key=value` pair, as printed after `%%%mzn-stat:`.
    pub(crate) fn record(&mut self, pair: &str) {
        if let Some((key, value)) = pair.split_once('=') {
            let key = key.trim();
            let _ = self
                .values
                .insert(key.to_owned(), Statistic::parse(key, value));
        }
    }

    pub(crate) fn record_elapsed(&mut self, elapsed: Duration) {
        let _ = self
            .values
            .insert("time".to_owned(), Statistic::Duration(elapsed));
    }
}

impl<'a> IntoIterator for &'a Statistics {
    type Item = (&'a String, &'a Statistic);
    type IntoIter = btree_map::Iter<'a, String, Statistic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_typed() {
        let mut statistics = Statistics::default();
        statistics.record("nodes=42");
        statistics.record("peakMem=1.5");
        statistics.record("method=\"satisfy\"");
        statistics.record("flatTime=0.25");

        assert_eq!(statistics.get("nodes"), Some(&Statistic::Int(42)));
        assert_eq!(statistics.get("peakMem"), Some(&Statistic::Float(1.5)));
        assert_eq!(
            statistics.get("method"),
            Some(&Statistic::Text("satisfy".to_owned()))
        );
        assert_eq!(
            statistics.get("flatTime"),
            Some(&Statistic::Duration(Duration::from_millis(250)))
        );
        assert_eq!(statistics.len(), 4);
    }

    #[test]
    fn lines_without_a_value_are_ignored() {
        let mut statistics = Statistics::default();
        statistics.record("garbage");

        assert!(statistics.is_empty());
    }
}
