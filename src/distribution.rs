//! # Degree distributions (C3)
//!
//! Ideal Soliton and Robust Soliton PMFs over `{1..K}`, plus a sampler
//! driven by a cumulative distribution and a uniform `[0,1)` draw. Grounded
//! on `original_source/rng.hpp`'s `soliton_distribution`, reworked from a
//! `std::discrete_distribution` table into an explicit PMF/CDF pair so the
//! exact numeric values in the spec's test vectors are checkable directly.

use rand::Rng;

/// Ideal Soliton distribution over degree `1..=k`.
#[derive(Debug, Clone, Copy)]
pub struct Soliton {
    k: u32,
}

impl Soliton {
    pub fn new(k: u32) -> Self {
        Soliton { k }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    /// `pmf(1) = 1/K`, `pmf(d) = 1/(d(d-1))` for `2 <= d <= K`, else 0.
    pub fn pmf(&self, d: u32) -> f64 {
        if d == 1 {
            1.0 / self.k as f64
        } else if d >= 2 && d <= self.k {
            1.0 / (d as f64 * (d as f64 - 1.0))
        } else {
            0.0
        }
    }

    pub fn cdf(&self, d: u32) -> f64 {
        (1..=d.min(self.k)).map(|i| self.pmf(i)).sum()
    }

    /// Draw a degree in `1..=K` via inverse-CDF sampling against `u`.
    pub fn sample_with(&self, u: f64) -> u32 {
        let mut acc = 0.0;
        for d in 1..=self.k {
            acc += self.pmf(d);
            if u < acc {
                return d;
            }
        }
        self.k
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.sample_with(rng.random::<f64>())
    }
}

/// Robust Soliton distribution: `soliton + tau`, renormalized.
#[derive(Debug, Clone, Copy)]
pub struct RobustSoliton {
    soliton: Soliton,
    c: f64,
    delta: f64,
    s: f64,
    pivot: u32,
    z: f64,
}

impl RobustSoliton {
    pub fn new(k: u32, c: f64, delta: f64) -> Self {
        let kf = k as f64;
        let s = c * (kf / delta).ln() * kf.sqrt();
        let pivot = ((kf / s).round() as u32).max(1).min(k);
        let soliton = Soliton::new(k);

        let mut rs = RobustSoliton {
            soliton,
            c,
            delta,
            s,
            pivot,
            z: 1.0,
        };
        let z: f64 = (1..=k).map(|d| soliton.pmf(d) + rs.tau(d)).sum();
        rs.z = z;
        rs
    }

    pub fn k(&self) -> u32 {
        self.soliton.k()
    }

    pub fn s(&self) -> f64 {
        self.s
    }

    pub fn pivot(&self) -> u32 {
        self.pivot
    }

    /// `tau(d)`: a hump of size `S/K` for `d < pivot`, a spike of size
    /// `S*ln(S/delta)/K` exactly at the pivot, else 0.
    fn tau(&self, d: u32) -> f64 {
        let k = self.k() as f64;
        if d < self.pivot {
            self.s / (k * d as f64)
        } else if d == self.pivot {
            self.s * (self.s / self.delta).ln() / k
        } else {
            0.0
        }
    }

    pub fn pmf(&self, d: u32) -> f64 {
        if d < 1 || d > self.k() {
            return 0.0;
        }
        (self.soliton.pmf(d) + self.tau(d)) / self.z
    }

    pub fn cdf(&self, d: u32) -> f64 {
        (1..=d.min(self.k())).map(|i| self.pmf(i)).sum()
    }

    pub fn sample_with(&self, u: f64) -> u32 {
        let mut acc = 0.0;
        for d in 1..=self.k() {
            acc += self.pmf(d);
            if u < acc {
                return d;
            }
        }
        self.k()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.sample_with(rng.random::<f64>())
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }
}

/// Either degree distribution, dispatched dynamically so `RowGenerator`
/// (C4) can hold one without a type parameter.
#[derive(Debug, Clone, Copy)]
pub enum DegreeDistribution {
    Soliton(Soliton),
    Robust(RobustSoliton),
}

impl DegreeDistribution {
    pub fn k(&self) -> u32 {
        match self {
            DegreeDistribution::Soliton(s) => s.k(),
            DegreeDistribution::Robust(r) => r.k(),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            DegreeDistribution::Soliton(s) => s.sample(rng),
            DegreeDistribution::Robust(r) => r.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soliton_pmf_matches_spec_scenario_1() {
        let s = Soliton::new(10_000);
        assert!((s.pmf(1) - 1e-4).abs() < 1e-12);
        assert!((s.pmf(2) - 0.5).abs() < 1e-12);
        assert!((s.pmf(3) - (1.0 / 6.0)).abs() < 1e-12);
        assert_eq!(s.pmf(0), 0.0);
        assert_eq!(s.pmf(10_001), 0.0);
    }

    #[test]
    fn soliton_pmf_sums_to_one() {
        let s = Soliton::new(500);
        let total: f64 = (1..=500).map(|d| s.pmf(d)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn robust_soliton_matches_spec_scenario_2() {
        let r = RobustSoliton::new(10_000, 0.2, 0.05);
        assert!((r.s() - 244.0).abs() < 1.0, "S={}", r.s());
        assert_eq!(r.pivot(), 41);
        assert!((r.pmf(41) - 0.207).abs() < 0.01, "pmf(41)={}", r.pmf(41));
        assert!((r.pmf(2) - 0.394).abs() < 0.01, "pmf(2)={}", r.pmf(2));
    }

    #[test]
    fn robust_soliton_pmf_sums_to_one() {
        let r = RobustSoliton::new(1_000, 0.1, 0.05);
        let total: f64 = (1..=1_000).map(|d| r.pmf(d)).sum();
        assert!((total - 1.0).abs() < 1e-6, "total={}", total);
    }

    #[test]
    fn sample_with_boundaries_stays_in_range() {
        let s = Soliton::new(100);
        assert_eq!(s.sample_with(0.0), 1);
        let d = s.sample_with(0.999_999);
        assert!(d >= 1 && d <= 100);
    }

    #[test]
    fn sample_is_deterministic_given_same_draw() {
        let r = RobustSoliton::new(200, 0.1, 0.05);
        assert_eq!(r.sample_with(0.37), r.sample_with(0.37));
    }
}
