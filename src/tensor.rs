//! Dense n-dimensional `f64` array.
//!
//! Values are stored row-major in a flat `Vec<f64>` alongside the shape. The
//! arithmetic operators require identical shapes and panic otherwise, in the
//! same way slice-based updates assert matching lengths. Constructors that take
//! caller data return `Result` instead.

use std::ops::{Add, Div, Index, IndexMut, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};

/// Dense tensor of `f64` values with an explicit shape.
///
/// # Example
///
/// ```
/// use neural_mbgd::tensor::Tensor;
///
/// let t = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t[[1, 2]], 6.0);
/// assert_eq!(t.row(0), &[1.0, 2.0, 3.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = NetError;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::from_vec(raw.shape, raw.data)
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Tensor {
    /// Tensor of the given shape filled with `value`.
    pub fn filled(shape: &[usize], value: f64) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; element_count(shape)],
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::filled(shape, 1.0)
    }

    /// Wraps existing values. Fails if `data.len()` is not the product of `shape`
    /// or if the shape is empty.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        if shape.is_empty() {
            return Err(NetError::invalid("tensor shape must have at least one dimension"));
        }
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(NetError::invalid(format!(
                "tensor of shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Rank-1 tensor over a copy of `values`.
    pub fn vector(values: &[f64]) -> Self {
        Self {
            shape: vec![values.len()],
            data: values.to_vec(),
        }
    }

    /// Rank-2 tensor from equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(NetError::invalid("all rows must have the same length"));
        }
        let data = rows.iter().flatten().copied().collect();
        Self::from_vec(vec![rows.len(), cols], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, &dim) in index.iter().zip(self.shape.iter()) {
            if i >= dim {
                return None;
            }
            offset = offset * dim + i;
        }
        Some(offset)
    }

    /// Element at a multi-index, or `None` when out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.offset(index).map(|o| self.data[o])
    }

    /// Assigns one element in place.
    pub fn set(&mut self, index: &[usize], value: f64) -> Result<()> {
        let offset = self.offset(index).ok_or_else(|| {
            NetError::invalid(format!(
                "index {:?} out of bounds for shape {:?}",
                index, self.shape
            ))
        })?;
        self.data[offset] = value;
        Ok(())
    }

    /// Row `i` of a rank-2 tensor.
    ///
    /// # Panics
    ///
    /// Panics if the tensor is not rank 2 or `i` is out of range.
    pub fn row(&self, i: usize) -> &[f64] {
        assert_eq!(self.rank(), 2, "row() requires a rank-2 tensor");
        let cols = self.shape[1];
        &self.data[i * cols..(i + 1) * cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        assert_eq!(self.rank(), 2, "row_mut() requires a rank-2 tensor");
        let cols = self.shape[1];
        &mut self.data[i * cols..(i + 1) * cols]
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Multiplies every element by `factor` in place.
    pub fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|x| *x *= factor);
    }

    pub fn add_scalar(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x += value);
    }

    /// Applies `f` elementwise, returning a new tensor of the same shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    fn zip_with(&self, other: &Tensor, op: &str, f: impl Fn(f64, f64) -> f64) -> Tensor {
        assert_eq!(
            self.shape, other.shape,
            "Tensors must have the same shape for {}",
            op
        );
        Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

impl<const N: usize> Index<[usize; N]> for Tensor {
    type Output = f64;

    fn index(&self, index: [usize; N]) -> &f64 {
        match self.offset(&index) {
            Some(o) => &self.data[o],
            None => panic!("index {:?} out of bounds for shape {:?}", index, self.shape),
        }
    }
}

impl<const N: usize> IndexMut<[usize; N]> for Tensor {
    fn index_mut(&mut self, index: [usize; N]) -> &mut f64 {
        match self.offset(&index) {
            Some(o) => &mut self.data[o],
            None => panic!("index {:?} out of bounds for shape {:?}", index, self.shape),
        }
    }
}

impl Add for &Tensor {
    type Output = Tensor;
    fn add(self, rhs: &Tensor) -> Tensor {
        self.zip_with(rhs, "addition", |a, b| a + b)
    }
}

impl Sub for &Tensor {
    type Output = Tensor;
    fn sub(self, rhs: &Tensor) -> Tensor {
        self.zip_with(rhs, "subtraction", |a, b| a - b)
    }
}

impl Mul for &Tensor {
    type Output = Tensor;
    fn mul(self, rhs: &Tensor) -> Tensor {
        self.zip_with(rhs, "multiplication", |a, b| a * b)
    }
}

impl Div for &Tensor {
    type Output = Tensor;
    fn div(self, rhs: &Tensor) -> Tensor {
        self.zip_with(rhs, "division", |a, b| a / b)
    }
}

impl Mul<f64> for &Tensor {
    type Output = Tensor;
    fn mul(self, rhs: f64) -> Tensor {
        self.map(|x| x * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_count() {
        assert!(Tensor::from_vec(vec![2, 2], vec![1.0; 4]).is_ok());
        assert!(Tensor::from_vec(vec![2, 2], vec![1.0; 3]).is_err());
        assert!(Tensor::from_vec(vec![], vec![]).is_err());
    }

    #[test]
    fn test_indexing_is_row_major() {
        let mut t = Tensor::zeros(&[3, 2]);
        t[[2, 1]] = 5.0;
        assert_eq!(t.as_slice()[5], 5.0);
        assert_eq!(t.get(&[2, 1]), Some(5.0));
        assert_eq!(t.get(&[3, 0]), None);
        assert!(t.set(&[0, 2], 1.0).is_err());
    }

    #[test]
    fn test_elementwise_ops() {
        let a = Tensor::vector(&[1.0, 2.0, 4.0]);
        let b = Tensor::vector(&[2.0, 2.0, 2.0]);
        assert_eq!((&a + &b).as_slice(), &[3.0, 4.0, 6.0]);
        assert_eq!((&a - &b).as_slice(), &[-1.0, 0.0, 2.0]);
        assert_eq!((&a * &b).as_slice(), &[2.0, 4.0, 8.0]);
        assert_eq!((&a / &b).as_slice(), &[0.5, 1.0, 2.0]);
        assert_eq!((&a * 3.0).as_slice(), &[3.0, 6.0, 12.0]);
        assert_eq!(a.sum(), 7.0);
    }

    #[test]
    #[should_panic(expected = "Tensors must have the same shape")]
    fn test_shape_mismatch_panics() {
        let _ = &Tensor::zeros(&[2]) + &Tensor::zeros(&[3]);
    }

    #[test]
    fn test_serde_validates_shape() {
        let t = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Tensor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);

        let bad = r#"{"shape":[2,2],"data":[1.0,2.0]}"#;
        assert!(serde_json::from_str::<Tensor>(bad).is_err());
    }
}
