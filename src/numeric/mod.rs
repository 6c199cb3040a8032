// Statistical primitives for the ANOVA engine
//
// The regularized incomplete beta function turns an F statistic into a
// p-value: for F with (d1, d2) degrees of freedom,
//
//     P(X > F) = 1 - I_x(d1/2, d2/2),   x = d1*F / (d1*F + d2)
//
// I_x is evaluated with the Lentz continued fraction and a Lanczos
// log-gamma prefactor. Both fail loudly (NumericError) instead of returning
// garbage when the fraction does not converge or an argument is out of
// domain.

mod anova;
mod beta;

pub use anova::{one_way_anova, Anova, FTest, Moments};
pub use beta::{betacf, f_test_p_value, gammln, ibeta, BETACF_EPS, BETACF_FPMIN, BETACF_MAX_ITER};

#[cfg(test)]
mod tests;
