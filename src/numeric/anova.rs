// One-way analysis of variance over streamed group moments

use super::beta::f_test_p_value;
use crate::error::Result;

/// Running count, sum and sum of squares of a sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub count: u64,
    pub sum: f64,
    pub sum_of_squares: f64,
}

impl Moments {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
    }

    pub fn merge(&mut self, other: &Moments) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    /// Bessel-corrected variance; undefined below two samples
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count <= 1 {
            return None;
        }
        let n = self.count as f64;
        let centered = self.sum_of_squares - self.sum * self.sum / n;
        Some((centered / (n - 1.0)).max(0.0))
    }

    pub fn sample_std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }
}

/// F test across at least two non-empty groups
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FTest {
    /// Total sum of squares
    pub sst: f64,
    /// Between-groups sum of squares
    pub sstr: f64,
    /// Within-groups (error) sum of squares
    pub sse: f64,
    pub df_between: u64,
    pub df_within: u64,
    pub f: f64,
    pub p: f64,
}

/// Pooled statistics for one data keyword
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anova {
    /// Moments over every value of every group
    pub total: Moments,
    pub nonempty_groups: usize,
    /// Present only with two or more non-empty groups
    pub test: Option<FTest>,
}

/// Pool per-group moments into a one-way ANOVA
///
/// Empty groups are skipped. A NaN F statistic (zero error variance, or no
/// within-group degrees of freedom) is reported as infinite.
pub fn one_way_anova<'a, I>(groups: I) -> Result<Anova>
where
    I: IntoIterator<Item = &'a Moments>,
{
    let mut total = Moments::default();
    let mut between_terms = 0.0;
    let mut nonempty_groups = 0usize;

    for group in groups.into_iter().filter(|g| g.count > 0) {
        total.merge(group);
        between_terms += group.sum * group.sum / group.count as f64;
        nonempty_groups += 1;
    }

    if nonempty_groups < 2 {
        return Ok(Anova {
            total,
            nonempty_groups,
            test: None,
        });
    }

    let n = total.count as f64;
    let correction = total.sum * total.sum / n;
    let sst = (total.sum_of_squares - correction).max(0.0);
    let sstr = (between_terms - correction).max(0.0);
    let sse = (sst - sstr).max(0.0);

    let df_between = (nonempty_groups - 1) as u64;
    let df_within = total.count - nonempty_groups as u64;

    let f = if df_within == 0 {
        f64::NAN
    } else {
        (sstr / df_between as f64) / (sse / df_within as f64)
    };
    let f = if f.is_nan() { f64::INFINITY } else { f };
    let p = f_test_p_value(f, df_between as f64, df_within as f64)?;

    Ok(Anova {
        total,
        nonempty_groups,
        test: Some(FTest {
            sst,
            sstr,
            sse,
            df_between,
            df_within,
            f,
            p,
        }),
    })
}
