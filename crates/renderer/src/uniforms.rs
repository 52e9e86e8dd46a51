use std::borrow::Cow;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::gl::{Components, GraphicsApi, MatrixDim};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniformError {
    #[error("unknown uniform upload kind '{0}'")]
    UnknownKind(String),
    #[error("{kind} expects {expected} values, got {actual}")]
    Arity {
        kind: UniformKind,
        expected: String,
        actual: usize,
    },
    #[error("{kind} expects {expected} data, got {actual} data")]
    ScalarType {
        kind: UniformKind,
        expected: &'static str,
        actual: &'static str,
    },
}

/// GPU upload variant used for one uniform (the `uniform*` call family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float1,
    Float2,
    Float3,
    Float4,
    Float1v,
    Float2v,
    Float3v,
    Float4v,
    Int1,
    Int2,
    Int3,
    Int4,
    Int1v,
    Int2v,
    Int3v,
    Int4v,
    Mat2,
    Mat3,
    Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Float,
    Int,
}

impl Scalar {
    fn name(self) -> &'static str {
        match self {
            Scalar::Float => "float",
            Scalar::Int => "int",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Vector {
        scalar: Scalar,
        components: Components,
        array: bool,
    },
    Matrix(MatrixDim),
}

impl UniformKind {
    /// Every supported kind, in declaration order.
    pub const ALL: [UniformKind; 19] = [
        UniformKind::Float1,
        UniformKind::Float2,
        UniformKind::Float3,
        UniformKind::Float4,
        UniformKind::Float1v,
        UniformKind::Float2v,
        UniformKind::Float3v,
        UniformKind::Float4v,
        UniformKind::Int1,
        UniformKind::Int2,
        UniformKind::Int3,
        UniformKind::Int4,
        UniformKind::Int1v,
        UniformKind::Int2v,
        UniformKind::Int3v,
        UniformKind::Int4v,
        UniformKind::Mat2,
        UniformKind::Mat3,
        UniformKind::Mat4,
    ];

    /// WebGL method name for this upload, e.g. `uniform4fv`.
    pub fn method_name(self) -> &'static str {
        match self {
            UniformKind::Float1 => "uniform1f",
            UniformKind::Float2 => "uniform2f",
            UniformKind::Float3 => "uniform3f",
            UniformKind::Float4 => "uniform4f",
            UniformKind::Float1v => "uniform1fv",
            UniformKind::Float2v => "uniform2fv",
            UniformKind::Float3v => "uniform3fv",
            UniformKind::Float4v => "uniform4fv",
            UniformKind::Int1 => "uniform1i",
            UniformKind::Int2 => "uniform2i",
            UniformKind::Int3 => "uniform3i",
            UniformKind::Int4 => "uniform4i",
            UniformKind::Int1v => "uniform1iv",
            UniformKind::Int2v => "uniform2iv",
            UniformKind::Int3v => "uniform3iv",
            UniformKind::Int4v => "uniform4iv",
            UniformKind::Mat2 => "uniformMatrix2fv",
            UniformKind::Mat3 => "uniformMatrix3fv",
            UniformKind::Mat4 => "uniformMatrix4fv",
        }
    }

    /// True for kinds that take integer data (`uniform*i*`, also used for bools).
    pub fn is_integer(self) -> bool {
        matches!(self.shape(), Shape::Vector { scalar: Scalar::Int, .. })
    }

    fn shape(self) -> Shape {
        use Components::{Four, One, Three, Two};
        let vector = |scalar, components, array| Shape::Vector {
            scalar,
            components,
            array,
        };
        match self {
            UniformKind::Float1 => vector(Scalar::Float, One, false),
            UniformKind::Float2 => vector(Scalar::Float, Two, false),
            UniformKind::Float3 => vector(Scalar::Float, Three, false),
            UniformKind::Float4 => vector(Scalar::Float, Four, false),
            UniformKind::Float1v => vector(Scalar::Float, One, true),
            UniformKind::Float2v => vector(Scalar::Float, Two, true),
            UniformKind::Float3v => vector(Scalar::Float, Three, true),
            UniformKind::Float4v => vector(Scalar::Float, Four, true),
            UniformKind::Int1 => vector(Scalar::Int, One, false),
            UniformKind::Int2 => vector(Scalar::Int, Two, false),
            UniformKind::Int3 => vector(Scalar::Int, Three, false),
            UniformKind::Int4 => vector(Scalar::Int, Four, false),
            UniformKind::Int1v => vector(Scalar::Int, One, true),
            UniformKind::Int2v => vector(Scalar::Int, Two, true),
            UniformKind::Int3v => vector(Scalar::Int, Three, true),
            UniformKind::Int4v => vector(Scalar::Int, Four, true),
            UniformKind::Mat2 => Shape::Matrix(MatrixDim::Two),
            UniformKind::Mat3 => Shape::Matrix(MatrixDim::Three),
            UniformKind::Mat4 => Shape::Matrix(MatrixDim::Four),
        }
    }

    /// Checks that `data` can be uploaded with this kind.
    pub fn check(self, data: &UniformData) -> Result<(), UniformError> {
        let (scalar, group, array) = match self.shape() {
            Shape::Vector {
                scalar,
                components,
                array,
            } => (scalar, components.count(), array),
            Shape::Matrix(dim) => (Scalar::Float, dim.element_count(), true),
        };

        let actual_scalar = match data {
            UniformData::Float(_) => Scalar::Float,
            UniformData::Int(_) => Scalar::Int,
        };
        if actual_scalar != scalar {
            return Err(UniformError::ScalarType {
                kind: self,
                expected: scalar.name(),
                actual: actual_scalar.name(),
            });
        }

        let len = data.len();
        let fits = if array {
            len > 0 && len % group == 0
        } else {
            len == group
        };
        if !fits {
            let expected = if array {
                format!("a non-zero multiple of {group}")
            } else {
                group.to_string()
            };
            return Err(UniformError::Arity {
                kind: self,
                expected,
                actual: len,
            });
        }
        Ok(())
    }

    /// Validates `data` and issues the matching upload call.
    pub(crate) fn upload<G: GraphicsApi>(
        self,
        api: &G,
        location: Option<&G::UniformLocation>,
        data: &UniformData,
    ) -> Result<(), UniformError> {
        self.check(data)?;
        match (self.shape(), data) {
            (Shape::Vector { components, .. }, UniformData::Float(values)) => {
                api.uniform_f32(location, components, values)
            }
            (Shape::Vector { components, .. }, UniformData::Int(values)) => {
                api.uniform_i32(location, components, values)
            }
            (Shape::Matrix(dim), UniformData::Float(values)) => {
                api.uniform_matrix_f32(location, dim, values)
            }
            (Shape::Matrix(_), UniformData::Int(_)) => {
                unreachable!("check rejects integer matrix data")
            }
        }
        Ok(())
    }
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for UniformKind {
    type Err = UniformError;

    /// Accepts WebGL method names (`uniform2f`, `uniformMatrix4fv`) in any
    /// case, with or without the `uniform` prefix.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let bare = normalized.strip_prefix("uniform").unwrap_or(&normalized);
        let bare = bare.strip_prefix("matrix").map_or_else(
            || bare.to_string(),
            |rest| format!("mat{}", rest.trim_end_matches("fv")),
        );
        UniformKind::ALL
            .into_iter()
            .find(|kind| {
                let name = kind.method_name().to_ascii_lowercase();
                let name = name.trim_start_matches("uniform");
                let name = name.strip_prefix("matrix").map_or_else(
                    || name.to_string(),
                    |rest| format!("mat{}", rest.trim_end_matches("fv")),
                );
                name == bare
            })
            .ok_or_else(|| UniformError::UnknownKind(value.trim().to_string()))
    }
}

/// Literal uniform payload.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

impl UniformData {
    pub fn len(&self) -> usize {
        match self {
            UniformData::Float(values) => values.len(),
            UniformData::Int(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<f32> for UniformData {
    fn from(value: f32) -> Self {
        UniformData::Float(vec![value])
    }
}

impl<const N: usize> From<[f32; N]> for UniformData {
    fn from(value: [f32; N]) -> Self {
        UniformData::Float(value.to_vec())
    }
}

impl From<Vec<f32>> for UniformData {
    fn from(value: Vec<f32>) -> Self {
        UniformData::Float(value)
    }
}

impl From<i32> for UniformData {
    fn from(value: i32) -> Self {
        UniformData::Int(vec![value])
    }
}

impl<const N: usize> From<[i32; N]> for UniformData {
    fn from(value: [i32; N]) -> Self {
        UniformData::Int(value.to_vec())
    }
}

impl From<Vec<i32>> for UniformData {
    fn from(value: Vec<i32>) -> Self {
        UniformData::Int(value)
    }
}

impl From<bool> for UniformData {
    fn from(value: bool) -> Self {
        UniformData::Int(vec![i32::from(value)])
    }
}

/// Function of frame time in milliseconds.
pub type AnimatedFn = Box<dyn Fn(f64) -> UniformData>;

/// Either a literal or a function evaluated every frame.
pub enum UniformValue {
    Constant(UniformData),
    Animated(AnimatedFn),
}

impl UniformValue {
    pub fn evaluate(&self, time_ms: f64) -> Cow<'_, UniformData> {
        match self {
            UniformValue::Constant(data) => Cow::Borrowed(data),
            UniformValue::Animated(func) => Cow::Owned(func(time_ms)),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, UniformValue::Animated(_))
    }
}

impl fmt::Debug for UniformValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformValue::Constant(data) => f.debug_tuple("Constant").field(data).finish(),
            UniformValue::Animated(_) => f.write_str("Animated(..)"),
        }
    }
}

/// Upload kind plus value for one named uniform.
#[derive(Debug)]
pub struct UniformBinding {
    pub kind: UniformKind,
    pub value: UniformValue,
}

impl UniformBinding {
    pub fn constant(kind: UniformKind, data: impl Into<UniformData>) -> Self {
        Self {
            kind,
            value: UniformValue::Constant(data.into()),
        }
    }

    pub fn animated<F, D>(kind: UniformKind, func: F) -> Self
    where
        F: Fn(f64) -> D + 'static,
        D: Into<UniformData>,
    {
        Self {
            kind,
            value: UniformValue::Animated(Box::new(move |time| func(time).into())),
        }
    }
}

/// Uniform name to binding; one table per registered program.
#[derive(Debug, Default)]
pub struct UniformTable {
    entries: BTreeMap<String, UniformBinding>,
}

impl UniformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a binding, returning the previous one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        binding: UniformBinding,
    ) -> Option<UniformBinding> {
        self.entries.insert(name.into(), binding)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, binding: UniformBinding) -> Self {
        self.insert(name, binding);
        self
    }

    pub fn get(&self, name: &str) -> Option<&UniformBinding> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<UniformBinding> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, UniformBinding> {
        self.entries.iter()
    }
}

impl<N: Into<String>> FromIterator<(N, UniformBinding)> for UniformTable {
    fn from_iter<I: IntoIterator<Item = (N, UniformBinding)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, binding)| (name.into(), binding))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a UniformTable {
    type Item = (&'a String, &'a UniformBinding);
    type IntoIter = btree_map::Iter<'a, String, UniformBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{Call, RecordingApi};

    #[test]
    fn parses_webgl_method_names() {
        assert_eq!("uniform1f".parse::<UniformKind>().unwrap(), UniformKind::Float1);
        assert_eq!("uniform4fv".parse::<UniformKind>().unwrap(), UniformKind::Float4v);
        assert_eq!("UNIFORM2I".parse::<UniformKind>().unwrap(), UniformKind::Int2);
        assert_eq!("3iv".parse::<UniformKind>().unwrap(), UniformKind::Int3v);
        assert_eq!(
            "uniformMatrix4fv".parse::<UniformKind>().unwrap(),
            UniformKind::Mat4
        );
        assert_eq!("mat3".parse::<UniformKind>().unwrap(), UniformKind::Mat3);
    }

    #[test]
    fn method_names_round_trip_through_parsing() {
        for kind in UniformKind::ALL {
            assert_eq!(kind.method_name().parse::<UniformKind>().unwrap(), kind);
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "uniform5f".parse::<UniformKind>().unwrap_err();
        assert_eq!(err, UniformError::UnknownKind("uniform5f".into()));
    }

    #[test]
    fn scalar_kinds_require_exact_component_count() {
        assert!(UniformKind::Float2.check(&UniformData::Float(vec![1.0, 2.0])).is_ok());
        let err = UniformKind::Float2.check(&UniformData::Float(vec![1.0])).unwrap_err();
        assert!(matches!(err, UniformError::Arity { actual: 1, .. }));
    }

    #[test]
    fn array_kinds_accept_multiples() {
        let colors = UniformData::Float(vec![0.5; 16]);
        assert!(UniformKind::Float4v.check(&colors).is_ok());
        assert!(UniformKind::Float4v
            .check(&UniformData::Float(vec![0.5; 6]))
            .is_err());
        assert!(UniformKind::Float4v
            .check(&UniformData::Float(Vec::new()))
            .is_err());
    }

    #[test]
    fn integer_kinds_reject_float_data() {
        let err = UniformKind::Int1.check(&1.0f32.into()).unwrap_err();
        assert!(matches!(
            err,
            UniformError::ScalarType {
                expected: "int",
                actual: "float",
                ..
            }
        ));
        assert!(UniformKind::Int1.check(&true.into()).is_ok());
    }

    #[test]
    fn upload_dispatches_by_shape() {
        let api = RecordingApi::new();
        UniformKind::Float3
            .upload(&api, Some(&7), &UniformData::Float(vec![1.0, 2.0, 3.0]))
            .unwrap();
        UniformKind::Mat2
            .upload(&api, None, &UniformData::Float(vec![1.0, 0.0, 0.0, 1.0]))
            .unwrap();
        UniformKind::Int1.upload(&api, Some(&8), &false.into()).unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::UniformF32 {
                    location: Some(7),
                    components: Components::Three,
                    values: vec![1.0, 2.0, 3.0],
                },
                Call::UniformMatrixF32 {
                    location: None,
                    dim: MatrixDim::Two,
                    values: vec![1.0, 0.0, 0.0, 1.0],
                },
                Call::UniformI32 {
                    location: Some(8),
                    components: Components::One,
                    values: vec![0],
                },
            ]
        );
    }

    #[test]
    fn animated_values_see_frame_time() {
        let binding = UniformBinding::animated(UniformKind::Float1, |time| (time * 0.001) as f32);
        assert_eq!(
            binding.value.evaluate(2500.0).into_owned(),
            UniformData::Float(vec![2.5])
        );
        assert!(binding.value.is_animated());
    }
}
