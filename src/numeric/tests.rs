// Tests for the statistical primitives
//
// Reference values were computed with 30-digit arbitrary precision; statrs
// serves as an independent implementation for sweeps.

use super::*;

fn close(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance
}

#[test]
fn test_gammln_known_values() {
    assert!(close(gammln(10.0).unwrap(), 12.801_827_480_081_47, 1e-9));
    assert!(close(gammln(0.5).unwrap(), 0.572_364_942_924_700_1, 1e-9));
    // Gamma(1) = Gamma(2) = 1
    assert!(close(gammln(1.0).unwrap(), 0.0, 1e-9));
    assert!(close(gammln(2.0).unwrap(), 0.0, 1e-9));
}

#[test]
fn test_gammln_domain() {
    assert!(gammln(0.0).unwrap_err().is_numeric());
    assert!(gammln(-1.5).is_err());
    assert!(gammln(f64::NAN).is_err());
    assert!(gammln(f64::INFINITY).is_err());
}

#[test]
fn test_gammln_matches_statrs() {
    for x in [0.1, 0.75, 1.5, 3.0, 7.25, 20.0, 150.0] {
        let ours = gammln(x).unwrap();
        let reference = statrs::function::gamma::ln_gamma(x);
        assert!(
            close(ours, reference, 1e-8 * reference.abs().max(1.0)),
            "x={} ours={} statrs={}",
            x,
            ours,
            reference
        );
    }
}

#[test]
fn test_ibeta_known_values() {
    assert!(close(ibeta(2.0, 3.0, 0.4).unwrap(), 0.5248, 1e-6));
    assert!(close(ibeta(0.5, 0.5, 0.3).unwrap(), 0.369_010_119_565_545_4, 1e-6));
    assert!(close(ibeta(5.0, 2.0, 0.9).unwrap(), 0.885_735, 1e-6));
}

#[test]
fn test_ibeta_endpoints() {
    assert_eq!(ibeta(2.0, 3.0, 0.0).unwrap(), 0.0);
    assert_eq!(ibeta(2.0, 3.0, 1.0).unwrap(), 1.0);
}

#[test]
fn test_ibeta_domain_errors() {
    assert!(ibeta(2.0, 3.0, -0.1).unwrap_err().is_numeric());
    assert!(ibeta(2.0, 3.0, 1.1).is_err());
    assert!(ibeta(2.0, 3.0, f64::NAN).is_err());
    assert!(ibeta(0.0, 3.0, 0.5).is_err());
    assert!(ibeta(2.0, -1.0, 0.5).is_err());
}

#[test]
fn test_ibeta_symmetry() {
    // I_x(a, b) = 1 - I_{1-x}(b, a)
    for &(a, b, x) in &[(2.0, 5.0, 0.2), (0.7, 1.3, 0.6), (10.0, 3.0, 0.75)] {
        let left = ibeta(a, b, x).unwrap();
        let right = 1.0 - ibeta(b, a, 1.0 - x).unwrap();
        assert!(close(left, right, 1e-6), "a={} b={} x={}", a, b, x);
    }
}

#[test]
fn test_ibeta_matches_statrs() {
    for &a in &[0.5, 1.0, 2.5, 6.0, 15.0] {
        for &b in &[0.5, 1.0, 3.0, 12.0] {
            for i in 1..20 {
                let x = i as f64 / 20.0;
                let ours = ibeta(a, b, x).unwrap();
                let reference = statrs::function::beta::beta_reg(a, b, x);
                assert!(
                    close(ours, reference, 1e-5),
                    "a={} b={} x={} ours={} statrs={}",
                    a,
                    b,
                    x,
                    ours,
                    reference
                );
            }
        }
    }
}

#[test]
fn test_betacf_gives_up_on_huge_parameters() {
    let err = betacf(1.0e6, 1.0e6, 0.5).unwrap_err();
    assert!(err.is_numeric());
    assert!(err.to_string().contains("did not converge"));
}

#[test]
fn test_f_test_p_value() {
    // three-group textbook example: F = 9.264706 on (2, 15)
    let p = f_test_p_value(9.264_705_882_352_942, 2.0, 15.0).unwrap();
    assert!(close(p, 0.002_398_777_329_392_906, 1e-6));

    assert_eq!(f_test_p_value(0.0, 1.0, 4.0).unwrap(), 1.0);
    assert_eq!(f_test_p_value(f64::INFINITY, 1.0, 4.0).unwrap(), 1.0);
    assert!(f_test_p_value(-1.0, 1.0, 4.0).is_err());
    assert!(f_test_p_value(1.0, 0.0, 4.0).is_err());
}

fn moments(values: &[f64]) -> Moments {
    let mut m = Moments::default();
    for &v in values {
        m.push(v);
    }
    m
}

#[test]
fn test_moments() {
    let m = moments(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
    assert_eq!(m.count, 8);
    assert_eq!(m.mean(), Some(5.0));
    assert!(close(m.sample_variance().unwrap(), 32.0 / 7.0, 1e-12));

    let single = moments(&[3.0]);
    assert_eq!(single.mean(), Some(3.0));
    assert_eq!(single.sample_variance(), None);
    assert_eq!(Moments::default().mean(), None);
}

#[test]
fn test_anova_three_groups() {
    let groups = [
        moments(&[6.0, 8.0, 4.0, 5.0, 3.0, 4.0]),
        moments(&[8.0, 12.0, 9.0, 11.0, 6.0, 8.0]),
        moments(&[13.0, 9.0, 11.0, 8.0, 7.0, 12.0]),
    ];
    let anova = one_way_anova(&groups).unwrap();
    let test = anova.test.unwrap();
    assert_eq!(anova.nonempty_groups, 3);
    assert_eq!(anova.total.count, 18);
    assert!(close(test.sst, 152.0, 1e-9));
    assert!(close(test.sstr, 84.0, 1e-9));
    assert!(close(test.sse, 68.0, 1e-9));
    assert_eq!((test.df_between, test.df_within), (2, 15));
    assert!(close(test.f, 9.264_705_882_352_942, 1e-9));
    assert!(close(test.p, 0.002_398_777_329_392_906, 1e-6));
}

#[test]
fn test_anova_two_groups_shifted() {
    let groups = [moments(&[1.0, 2.0, 3.0, 4.0]), moments(&[2.0, 3.0, 4.0, 5.0])];
    let test = one_way_anova(&groups).unwrap().test.unwrap();
    assert!(close(test.f, 1.2, 1e-9));
    assert!(close(test.p, 0.315_333_596_201_229_7, 1e-6));
}

#[test]
fn test_anova_equal_groups() {
    let groups = [moments(&[1.0, 2.0, 3.0]), moments(&[1.0, 2.0, 3.0])];
    let test = one_way_anova(&groups).unwrap().test.unwrap();
    assert!(test.f.abs() < 1e-12);
    assert!(close(test.p, 1.0, 1e-9));
}

#[test]
fn test_anova_single_group_has_no_test() {
    let groups = [moments(&[1.0, 2.0]), Moments::default()];
    let anova = one_way_anova(&groups).unwrap();
    assert!(anova.test.is_none());
    assert_eq!(anova.nonempty_groups, 1);
    assert_eq!(anova.total.count, 2);
}

#[test]
fn test_anova_zero_error_variance_is_infinite() {
    let groups = [moments(&[1.0, 1.0]), moments(&[5.0, 5.0])];
    let test = one_way_anova(&groups).unwrap().test.unwrap();
    assert!(test.f.is_infinite());
    assert_eq!(test.p, 1.0);

    let constant = [moments(&[2.0, 2.0]), moments(&[2.0, 2.0])];
    let test = one_way_anova(&constant).unwrap().test.unwrap();
    assert!(test.f.is_infinite());
}

#[test]
fn test_anova_no_within_degrees_of_freedom() {
    let groups = [moments(&[1.0]), moments(&[4.0])];
    let test = one_way_anova(&groups).unwrap().test.unwrap();
    assert_eq!(test.df_within, 0);
    assert!(test.f.is_infinite());
    assert_eq!(test.p, 1.0);
}
