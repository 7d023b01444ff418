// Tests for transfer function derivatives using finite differences.
// Analytical derivatives (in terms of x and in terms of y) must match central
// differences of `apply`, and the softmax Jacobian must match differences of
// the joint softmax.

use approx::assert_relative_eq;
use neural_mbgd::transfer::Transfer;

// ============================================================================
// Helpers
// ============================================================================

// Central difference of a scalar function.
fn numerical_derivative<F>(f: F, x: f64, h: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    (f(x + h) - f(x - h)) / (2.0 * h)
}

const H: f64 = 1e-5;

// ============================================================================
// Elementwise transfers
// ============================================================================

mod elementwise_tests {
    use super::*;

    const ELEMENTWISE: [Transfer; 4] = [
        Transfer::Sigmoid,
        Transfer::TanH,
        Transfer::ReLU,
        Transfer::Linear,
    ];

    #[test]
    fn test_derivative_matches_numerical() {
        for transfer in ELEMENTWISE {
            for &x in &[-2.3, -0.7, 0.4, 1.9] {
                let numerical = numerical_derivative(|v| transfer.apply(v), x, H);
                assert_relative_eq!(
                    transfer.derivative(x),
                    numerical,
                    max_relative = 1e-6,
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_derivative_at_output_matches_derivative() {
        for transfer in ELEMENTWISE {
            for &x in &[-1.5, -0.2, 0.3, 2.5] {
                let y = transfer.apply(x);
                assert_relative_eq!(
                    transfer.derivative_at(y),
                    transfer.derivative(x),
                    max_relative = 1e-12,
                    epsilon = 1e-15
                );
            }
        }
    }

    #[test]
    fn test_bulk_apply_is_elementwise() {
        let xs = [-1.0, 0.0, 0.5, 3.0];
        for transfer in ELEMENTWISE {
            let bulk = transfer.bulk_apply(&xs);
            for (b, &x) in bulk.iter().zip(&xs) {
                assert_eq!(*b, transfer.apply(x));
            }
            let derivs = transfer.bulk_derivative_at(&bulk);
            assert_eq!(derivs.shape(), &[4]);
        }
    }

    #[test]
    fn test_sigmoid_values() {
        assert_relative_eq!(Transfer::Sigmoid.apply(0.0), 0.5);
        assert_relative_eq!(Transfer::Sigmoid.derivative_at(0.5), 0.25);
        assert!(Transfer::Sigmoid.apply(-800.0) >= 0.0);
        assert_relative_eq!(Transfer::Sigmoid.apply(800.0), 1.0);
    }

    #[test]
    fn test_relu_policy_at_zero() {
        // The kink is assigned derivative 0 on both sides of the API.
        assert_eq!(Transfer::ReLU.apply(0.0), 0.0);
        assert_eq!(Transfer::ReLU.derivative(0.0), 0.0);
        assert_eq!(Transfer::ReLU.derivative_at(0.0), 0.0);
        assert_eq!(Transfer::ReLU.derivative(-3.0), 0.0);
    }
}

// ============================================================================
// Softmax
// ============================================================================

mod softmax_tests {
    use super::*;

    #[test]
    fn test_jacobian_matches_numerical() {
        let z = [0.3, -1.1, 0.8, 0.05];
        let y = Transfer::Softmax.bulk_apply(&z);
        let jacobian = Transfer::Softmax.bulk_derivative_at(&y);
        assert_eq!(jacobian.shape(), &[4, 4]);

        // J[k, i] = d y_i / d z_k
        for k in 0..4 {
            let mut plus = z;
            let mut minus = z;
            plus[k] += H;
            minus[k] -= H;
            let y_plus = Transfer::Softmax.bulk_apply(&plus);
            let y_minus = Transfer::Softmax.bulk_apply(&minus);
            for i in 0..4 {
                let numerical = (y_plus[i] - y_minus[i]) / (2.0 * H);
                assert_relative_eq!(
                    jacobian[[k, i]],
                    numerical,
                    max_relative = 1e-5,
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_jacobian_rows_sum_to_zero() {
        let y = Transfer::Softmax.bulk_apply(&[1.0, 2.0, 3.0]);
        let jacobian = Transfer::softmax_jacobian(&y);
        for k in 0..3 {
            let row_sum: f64 = jacobian.row(k).iter().sum();
            assert_relative_eq!(row_sum, 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_softmax_shift_invariant() {
        let a = Transfer::Softmax.bulk_apply(&[1.0, 2.0, 3.0]);
        let b = Transfer::Softmax.bulk_apply(&[101.0, 102.0, 103.0]);
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(*x, *y, epsilon = 1e-12);
        }
    }
}
