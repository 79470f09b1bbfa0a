//! Python bindings for the reparser inline markup engine.

use std::borrow::Cow;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};
use pyo3::IntoPyObjectExt;
use reparser_core::{
    AttrValue, CaptureRef, ConfigError, Fragment, HookError, Hooks, Parser as CoreParser,
    Span as CoreSpan, TokenDefinition, ValueSource,
};
use tracing::{debug, warn};

// ============================================================================
// Span
// ============================================================================

/// Source location in the (preprocessed) input, in byte offsets.
#[pyclass(frozen, get_all, name = "Span")]
#[derive(Clone)]
pub struct PySpan {
    pub start: usize,
    pub end: usize,
}

#[pymethods]
impl PySpan {
    fn __repr__(&self) -> String {
        format!("Span({}, {})", self.start, self.end)
    }

    #[getter]
    fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

impl From<CoreSpan> for PySpan {
    fn from(s: CoreSpan) -> Self {
        PySpan {
            start: s.start,
            end: s.end,
        }
    }
}

// ============================================================================
// Attribute values
// ============================================================================

fn convert_attr_value(py: Python<'_>, v: AttrValue) -> PyResult<PyObject> {
    match v {
        AttrValue::Str(s) => s.into_py_any(py),
        AttrValue::Bool(b) => b.into_py_any(py),
        AttrValue::Int(i) => i.into_py_any(py),
        AttrValue::Float(f) => f.into_py_any(py),
        AttrValue::List(l) => {
            let list = PyList::empty(py);
            for item in l {
                list.append(convert_attr_value(py, item)?)?;
            }
            Ok(list.into_any().unbind())
        }
    }
}

fn extract_attr_value(obj: &Bound<'_, PyAny>) -> PyResult<AttrValue> {
    // bool before int: Python bools are ints.
    if let Ok(b) = obj.downcast::<PyBool>() {
        return Ok(AttrValue::Bool(b.is_true()));
    }
    if obj.is_instance_of::<PyInt>() {
        return Ok(AttrValue::Int(obj.extract()?));
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(AttrValue::Float(obj.extract()?));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(AttrValue::Str(obj.extract()?));
    }
    if obj.is_instance_of::<PyList>() || obj.is_instance_of::<PyTuple>() {
        let items = obj
            .try_iter()?
            .map(|item| extract_attr_value(&item?))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(AttrValue::List(items));
    }
    Ok(AttrValue::Str(obj.str()?.extract()?))
}

// ============================================================================
// MatchGroup
// ============================================================================

/// Reference to a named group of the token's match, resolved at parse time.
///
/// Args:
///     group: Group name in the token's pattern
///     func: Optional callable applied to the captured string
#[pyclass(frozen, name = "MatchGroup")]
pub struct PyMatchGroup {
    #[pyo3(get)]
    group: String,
    #[pyo3(get)]
    func: Option<PyObject>,
}

#[pymethods]
impl PyMatchGroup {
    #[new]
    #[pyo3(signature = (group, func=None), text_signature = "(group, func=None)")]
    fn new(group: String, func: Option<PyObject>) -> Self {
        PyMatchGroup { group, func }
    }

    fn __repr__(&self) -> String {
        format!("MatchGroup({:?}, func={})", self.group, self.func.is_some())
    }
}

impl PyMatchGroup {
    fn to_capture_ref(&self, py: Python<'_>) -> CaptureRef {
        let capture = CaptureRef::new(self.group.as_str());
        match &self.func {
            None => capture,
            Some(func) => {
                let func = func.clone_ref(py);
                let group = self.group.clone();
                capture.with_transform(move |value: &str| call_transform(&func, &group, value))
            }
        }
    }
}

/// Calls a Python transform; a raising transform keeps the raw capture.
fn call_transform(func: &PyObject, group: &str, value: &str) -> AttrValue {
    Python::with_gil(|py| {
        func.call1(py, (value,))
            .and_then(|out| extract_attr_value(out.bind(py)))
            .unwrap_or_else(|e| {
                warn!(group, error = %e, "transform raised, keeping captured text");
                AttrValue::from(value)
            })
    })
}

fn value_source(py: Python<'_>, obj: &Bound<'_, PyAny>) -> PyResult<ValueSource> {
    if let Ok(group) = obj.downcast::<PyMatchGroup>() {
        return Ok(ValueSource::Capture(group.get().to_capture_ref(py)));
    }
    Ok(ValueSource::Literal(extract_attr_value(obj)?))
}

// ============================================================================
// Token
// ============================================================================

/// Token definition.
///
/// Args:
///     name: Unique identifier (letters, digits, underscores)
///     pattern_start: Regex for the start delimiter, or the whole token
///     pattern_end: Regex for the end delimiter; None makes a single token
///     text: Replacement text for single tokens (str or MatchGroup)
///     skip: Suspend token recognition inside this token
///     **params: Attributes (literals or MatchGroup)
#[pyclass(frozen, name = "Token")]
pub struct PyToken {
    def: TokenDefinition,
}

#[pymethods]
impl PyToken {
    #[new]
    #[pyo3(
        signature = (name, pattern_start, pattern_end=None, text=None, skip=false, **params),
        text_signature = "(name, pattern_start, pattern_end=None, text=None, skip=False, **params)"
    )]
    fn new(
        py: Python<'_>,
        name: String,
        pattern_start: String,
        pattern_end: Option<String>,
        text: Option<&Bound<'_, PyAny>>,
        skip: bool,
        params: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        let mut def = match pattern_end {
            Some(end) => TokenDefinition::paired(name, pattern_start, end),
            None => TokenDefinition::single(name, pattern_start),
        }
        .with_skip(skip);

        if let Some(text) = text.filter(|t| !t.is_none()) {
            def = def.with_text(value_source(py, text)?);
        }
        if let Some(params) = params {
            for (key, value) in params.iter() {
                def = def.with_attr(key.extract::<String>()?, value_source(py, &value)?);
            }
        }
        Ok(PyToken { def })
    }

    #[getter]
    fn name(&self) -> &str {
        &self.def.name
    }

    #[getter]
    fn pattern_start(&self) -> &str {
        &self.def.start
    }

    #[getter]
    fn pattern_end(&self) -> Option<&str> {
        self.def.end.as_deref()
    }

    #[getter]
    fn skip(&self) -> bool {
        self.def.skip
    }

    fn __repr__(&self) -> String {
        format!(
            "Token({:?}, {:?}, {:?}, skip={})",
            self.def.name, self.def.start, self.def.end, self.def.skip
        )
    }
}

// ============================================================================
// Segment
// ============================================================================

/// A run of text with the attributes of every token covering it.
#[pyclass(frozen, name = "Segment")]
pub struct PySegment {
    #[pyo3(get)]
    text: String,
    #[pyo3(get)]
    params: Py<PyDict>,
    #[pyo3(get)]
    span: PySpan,
}

#[pymethods]
impl PySegment {
    fn __repr__(&self, py: Python<'_>) -> PyResult<String> {
        let params = self.params.bind(py).repr()?;
        Ok(format!("Segment({:?}, {})", self.text, params))
    }
}

impl PySegment {
    fn from_fragment(py: Python<'_>, fragment: Fragment) -> PyResult<Self> {
        let params = PyDict::new(py);
        for (key, value) in fragment.attributes {
            params.set_item(key, convert_attr_value(py, value)?)?;
        }
        Ok(PySegment {
            text: fragment.text,
            params: params.unbind(),
            span: fragment.span.into(),
        })
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Forwards hooks to the Python object's `preprocess` / `postprocess`.
struct PyHooks<'a, 'py> {
    obj: &'a Bound<'py, PyAny>,
}

impl PyHooks<'_, '_> {
    fn call(&self, method: &str, text: &str) -> Result<String, HookError> {
        self.obj
            .call_method1(method, (text,))
            .and_then(|out| out.extract::<String>())
            .map_err(|e| Box::new(e) as HookError)
    }
}

impl Hooks for PyHooks<'_, '_> {
    fn preprocess<'t>(&self, text: &'t str) -> Result<Cow<'t, str>, HookError> {
        self.call("preprocess", text).map(Cow::Owned)
    }

    fn postprocess<'t>(&self, span: &'t str) -> Result<Cow<'t, str>, HookError> {
        self.call("postprocess", span).map(Cow::Owned)
    }
}

/// Hook exceptions surface unchanged; everything else is a ValueError.
fn to_py_err(e: ConfigError) -> PyErr {
    match e {
        ConfigError::Hook { source, .. } => match source.downcast::<PyErr>() {
            Ok(err) => *err,
            Err(other) => PyValueError::new_err(other.to_string()),
        },
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Inline markup parser.
///
/// Subclass and override `preprocess(text)` / `postprocess(text)` to rewrite
/// the input before scanning or each plain-text segment afterwards.
///
/// Args:
///     tokens: Ordered list of Token; earlier tokens win ties
#[pyclass(frozen, subclass, name = "Parser")]
pub struct PyParser {
    inner: CoreParser,
}

#[pymethods]
impl PyParser {
    #[new]
    #[pyo3(signature = (tokens), text_signature = "(tokens)")]
    fn new(tokens: Vec<Bound<'_, PyToken>>) -> PyResult<Self> {
        let defs: Vec<_> = tokens.iter().map(|t| t.get().def.clone()).collect();
        let inner = CoreParser::new(defs).map_err(to_py_err)?;
        debug!(tokens = tokens.len(), "built parser");
        Ok(PyParser { inner })
    }

    /// Identity; override to rewrite the whole input before scanning.
    fn preprocess(&self, text: String) -> String {
        text
    }

    /// Identity; override to rewrite each plain-text segment.
    fn postprocess(&self, text: String) -> String {
        text
    }

    /// Split `text` into segments. Raises ValueError on bad configuration;
    /// exceptions from overridden hooks propagate as-is.
    #[pyo3(text_signature = "(self, text)")]
    fn parse(slf: &Bound<'_, Self>, text: &str) -> PyResult<Vec<PySegment>> {
        let py = slf.py();
        let parser = &slf.get().inner;

        // Without overrides the Python round trip per segment is skipped.
        let fragments = if slf.is_exact_instance_of::<PyParser>() {
            parser
                .parse_plain(text)
                .collect::<Result<Vec<_>, ConfigError>>()
        } else {
            let hooks = PyHooks { obj: slf.as_any() };
            parser
                .parse_with(text, &hooks)
                .and_then(|fragments| fragments.collect::<Result<Vec<_>, ConfigError>>())
        };

        fragments
            .map_err(to_py_err)?
            .into_iter()
            .map(|f| PySegment::from_fragment(py, f))
            .collect()
    }

    /// Token and role ("start", "end", "single") for a composite group name.
    fn lookup(&self, group: &str) -> Option<(String, String)> {
        self.inner
            .lookup(group)
            .map(|(token, role)| (token.name.clone(), role.to_string()))
    }

    /// The composite regular expression.
    #[getter]
    fn pattern(&self) -> &str {
        self.inner.pattern()
    }

    #[getter]
    fn token_names(&self) -> Vec<String> {
        self.inner.tokens().map(|t| t.name.clone()).collect()
    }

    fn __repr__(&self) -> String {
        format!("Parser(tokens={})", self.inner.tokens().count())
    }
}

// ============================================================================
// Module
// ============================================================================

/// reparser - single-pass regex-driven inline markup parser.
#[pymodule]
fn pyreparser(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySpan>()?;
    m.add_class::<PyMatchGroup>()?;
    m.add_class::<PyToken>()?;
    m.add_class::<PySegment>()?;
    m.add_class::<PyParser>()?;
    Ok(())
}
