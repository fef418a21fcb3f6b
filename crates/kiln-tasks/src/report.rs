//! JUnit report documents and incremental aggregation

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, instrument};

use kiln_core::{ReportScope, Subproject, TestSuite};

/// JUnit XML report structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JUnitReport {
    pub name: String,
    pub testsuites: Vec<JUnitTestSuite>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JUnitTestSuite {
    pub name: String,
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
    pub time: f64,
    pub timestamp: Option<String>,
    pub testcases: Vec<JUnitTestCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JUnitTestCase {
    pub name: String,
    pub classname: String,
    pub time: f64,
    pub outcome: CaseOutcome,
}

/// How a single test case ended
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Passed,
    Failure(JUnitFailure),
    Error(JUnitFailure),
    Skipped(JUnitFailure),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JUnitFailure {
    pub message: String,
    pub type_name: String,
    pub content: String,
}

impl JUnitReport {
    pub fn tests(&self) -> usize {
        self.testsuites.iter().map(|s| s.tests).sum()
    }

    pub fn failures(&self) -> usize {
        self.testsuites.iter().map(|s| s.failures).sum()
    }

    pub fn errors(&self) -> usize {
        self.testsuites.iter().map(|s| s.errors).sum()
    }

    pub fn skipped(&self) -> usize {
        self.testsuites.iter().map(|s| s.skipped).sum()
    }

    pub fn time(&self) -> f64 {
        self.testsuites.iter().map(|s| s.time).sum()
    }

    /// Append another report's suites after this report's own
    pub fn merge(&mut self, other: JUnitReport) {
        self.testsuites.extend(other.testsuites);
    }

    /// Read and parse a report file
    pub fn read(path: &Path) -> Result<Self, ReportError> {
        let xml = fs::read_to_string(path)?;
        Self::parse(&xml).map_err(|e| document_error(path, e))
    }

    /// Parse a JUnit document rooted at `<testsuites>` or at a bare `<testsuite>`
    pub fn parse(xml: &str) -> Result<Self, ReportError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut parser = Parser::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => parser.open(&e, false)?,
                Event::Empty(e) => parser.open(&e, true)?,
                Event::End(e) => parser.close(e.local_name().as_ref())?,
                Event::Text(t) => parser.text(&t.unescape()?),
                Event::CData(t) => parser.text(&String::from_utf8_lossy(&t.into_inner())),
                Event::Eof => break,
                _ => {}
            }
        }

        if !parser.saw_root {
            return Err(ReportError::Malformed(
                "no <testsuites> or <testsuite> element".to_string(),
            ));
        }
        Ok(parser.report)
    }

    /// Generate XML string
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuites name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">\n",
            escape_xml(&self.name),
            self.tests(),
            self.failures(),
            self.errors(),
            self.skipped(),
            self.time()
        ));

        for suite in &self.testsuites {
            let timestamp = suite
                .timestamp
                .as_ref()
                .map(|t| format!(" timestamp=\"{}\"", escape_xml(t)))
                .unwrap_or_default();
            xml.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\"{}>\n",
                escape_xml(&suite.name),
                suite.tests,
                suite.failures,
                suite.errors,
                suite.skipped,
                suite.time,
                timestamp
            ));

            for testcase in &suite.testcases {
                let open = format!(
                    "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
                    escape_xml(&testcase.name),
                    escape_xml(&testcase.classname),
                    testcase.time
                );
                let (tag, detail) = match &testcase.outcome {
                    CaseOutcome::Passed => {
                        xml.push_str(&open);
                        xml.push_str("/>\n");
                        continue;
                    }
                    CaseOutcome::Failure(d) => ("failure", d),
                    CaseOutcome::Error(d) => ("error", d),
                    CaseOutcome::Skipped(d) => ("skipped", d),
                };
                xml.push_str(&open);
                xml.push_str(">\n");
                xml.push_str(&format!(
                    "      <{} message=\"{}\" type=\"{}\">{}</{}>\n",
                    tag,
                    escape_xml(&detail.message),
                    escape_xml(&detail.type_name),
                    escape_xml(&detail.content),
                    tag
                ));
                xml.push_str("    </testcase>\n");
            }

            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");

        xml
    }

    /// Write the document, replacing `path` in one rename
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("xml.tmp");
        fs::write(&staging, self.to_xml())?;
        fs::rename(&staging, path)?;
        Ok(())
    }
}

impl JUnitTestSuite {
    /// Recompute the counters from the suite's test cases
    fn recount(&mut self) {
        if self.testcases.is_empty() {
            return;
        }
        let time = self.time;
        self.recount_direct();
        self.time = time;
    }

    /// Counters of a suite that holds other suites. Its own attributes include
    /// the children's totals, which are already counted on the children.
    fn recount_direct(&mut self) {
        self.tests = self.testcases.len();
        self.failures = self.count(|o| matches!(o, CaseOutcome::Failure(_)));
        self.errors = self.count(|o| matches!(o, CaseOutcome::Error(_)));
        self.skipped = self.count(|o| matches!(o, CaseOutcome::Skipped(_)));
        self.time = self.testcases.iter().map(|c| c.time).sum();
    }

    fn count(&self, pred: impl Fn(&CaseOutcome) -> bool) -> usize {
        self.testcases.iter().filter(|c| pred(&c.outcome)).count()
    }
}

#[derive(Debug, Clone, Copy)]
enum DetailKind {
    Failure,
    Error,
    Skipped,
}

/// A `<testsuite>` whose end tag has not been read yet
struct OpenSuite {
    suite: JUnitTestSuite,
    has_children: bool,
}

#[derive(Default)]
struct Parser {
    report: JUnitReport,
    saw_root: bool,
    suites: Vec<OpenSuite>,
    case: Option<JUnitTestCase>,
    detail: Option<(DetailKind, JUnitFailure)>,
}

impl Parser {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), ReportError> {
        match e.local_name().as_ref() {
            b"testsuites" => {
                self.saw_root = true;
                self.report.name = attr(e, b"name")?.unwrap_or_default();
            }
            b"testsuite" => {
                self.saw_root = true;
                if let Some(parent) = self.suites.last_mut() {
                    parent.has_children = true;
                }
                let suite = JUnitTestSuite {
                    name: attr(e, b"name")?.unwrap_or_default(),
                    tests: number(e, b"tests")?,
                    failures: number(e, b"failures")?,
                    errors: number(e, b"errors")?,
                    skipped: number(e, b"skipped")?,
                    time: seconds(e)?,
                    timestamp: attr(e, b"timestamp")?,
                    testcases: Vec::new(),
                };
                self.suites.push(OpenSuite {
                    suite,
                    has_children: false,
                });
                if empty {
                    self.close(b"testsuite")?;
                }
            }
            b"testcase" => {
                self.case = Some(JUnitTestCase {
                    name: attr(e, b"name")?.unwrap_or_default(),
                    classname: attr(e, b"classname")?.unwrap_or_default(),
                    time: seconds(e)?,
                    outcome: CaseOutcome::Passed,
                });
                if empty {
                    self.close(b"testcase")?;
                }
            }
            tag @ (b"failure" | b"error" | b"skipped") if self.case.is_some() => {
                let kind = match tag {
                    b"failure" => DetailKind::Failure,
                    b"error" => DetailKind::Error,
                    _ => DetailKind::Skipped,
                };
                let detail = JUnitFailure {
                    message: attr(e, b"message")?.unwrap_or_default(),
                    type_name: attr(e, b"type")?.unwrap_or_default(),
                    content: String::new(),
                };
                self.detail = Some((kind, detail));
                if empty {
                    self.close(tag)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), ReportError> {
        match name {
            b"failure" | b"error" | b"skipped" => {
                if let (Some((kind, detail)), Some(case)) = (self.detail.take(), self.case.as_mut())
                {
                    case.outcome = match kind {
                        DetailKind::Failure => CaseOutcome::Failure(detail),
                        DetailKind::Error => CaseOutcome::Error(detail),
                        DetailKind::Skipped => CaseOutcome::Skipped(detail),
                    };
                }
            }
            b"testcase" => {
                let Some(case) = self.case.take() else {
                    return Ok(());
                };
                match self.suites.last_mut() {
                    Some(open) => open.suite.testcases.push(case),
                    None => {
                        return Err(ReportError::Malformed(format!(
                            "testcase '{}' outside of a testsuite",
                            case.name
                        )))
                    }
                }
            }
            b"testsuite" => {
                // Nested suites are flattened, inner ones first
                if let Some(OpenSuite {
                    mut suite,
                    has_children,
                }) = self.suites.pop()
                {
                    if has_children {
                        suite.recount_direct();
                    } else {
                        suite.recount();
                    }
                    self.report.testsuites.push(suite);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some((_, detail)) = self.detail.as_mut() {
            detail.content.push_str(text);
        }
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReportError> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::InvalidAttr)?;
        if attribute.key.as_ref() == key {
            let value: Cow<'_, str> = attribute.unescape_value()?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn number(e: &BytesStart<'_>, key: &[u8]) -> Result<usize, ReportError> {
    Ok(attr(e, key)?
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0))
}

fn seconds(e: &BytesStart<'_>) -> Result<f64, ReportError> {
    Ok(attr(e, b"time")?
        .and_then(|v| v.trim().replace(',', "").parse().ok())
        .unwrap_or(0.0))
}

/// Source text of each top-level `<testsuite>` element, nested suites included
fn suite_records(xml: &str) -> Result<Vec<&str>, ReportError> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"testsuite" => {
                if depth == 0 {
                    start = before;
                }
                depth += 1;
            }
            Event::Empty(e) if depth == 0 && e.local_name().as_ref() == b"testsuite" => {
                records.push(&xml[before..reader.buffer_position()]);
            }
            Event::End(e) if e.local_name().as_ref() == b"testsuite" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    records.push(&xml[start..reader.buffer_position()]);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(records)
}

/// Append the records of `partial` to those of `cumulative`.
///
/// Records are copied byte for byte, so output, properties and attributes the
/// typed model does not know about survive. Only the root element is rewritten.
fn merge_documents(cumulative: &str, partial: &str) -> Result<(String, usize), ReportError> {
    let mut totals = JUnitReport::parse(cumulative)?;
    totals.merge(JUnitReport::parse(partial)?);

    let mut records = suite_records(cumulative)?;
    records.extend(suite_records(partial)?);

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuites name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">\n",
        escape_xml(&totals.name),
        totals.tests(),
        totals.failures(),
        totals.errors(),
        totals.skipped(),
        totals.time()
    ));
    for record in &records {
        xml.push_str("  ");
        xml.push_str(record);
        xml.push('\n');
    }
    xml.push_str("</testsuites>\n");
    Ok((xml, records.len()))
}

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Where an incremental report currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    /// Neither an in-progress nor a complete document exists
    NoDocument,
    /// An in-progress document is accumulating records
    InProgress,
    /// Only a complete document exists
    Complete,
}

/// Cumulative report for one suite of one subproject.
///
/// Each sub-unit writes its own document to the single-unit slot, which is then
/// folded into the in-progress document. Once every selected sub-unit has run,
/// `finalize` promotes the in-progress document to the complete slot. An
/// in-progress document left behind by an interrupted run is kept and extended.
#[derive(Debug, Clone)]
pub struct IncrementalReport {
    single_unit: PathBuf,
    in_progress: PathBuf,
    complete: PathBuf,
}

impl IncrementalReport {
    pub fn new(
        single_unit: impl Into<PathBuf>,
        in_progress: impl Into<PathBuf>,
        complete: impl Into<PathBuf>,
    ) -> Self {
        Self {
            single_unit: single_unit.into(),
            in_progress: in_progress.into(),
            complete: complete.into(),
        }
    }

    /// Report slots of one suite of a subproject
    pub fn for_suite(subproject: &Subproject, suite: TestSuite) -> Self {
        Self::new(
            subproject.report_path(suite, ReportScope::SingleUnit),
            subproject.report_path(suite, ReportScope::InProgress),
            subproject.report_path(suite, ReportScope::Complete),
        )
    }

    /// Where a sub-unit should write its own document
    pub fn single_unit_path(&self) -> &Path {
        &self.single_unit
    }

    pub fn in_progress_path(&self) -> &Path {
        &self.in_progress
    }

    pub fn complete_path(&self) -> &Path {
        &self.complete
    }

    pub fn state(&self) -> ReportState {
        if self.in_progress.is_file() {
            ReportState::InProgress
        } else if self.complete.is_file() {
            ReportState::Complete
        } else {
            ReportState::NoDocument
        }
    }

    /// Fold the single-unit document into the in-progress document.
    ///
    /// Without an in-progress document the single-unit document becomes it;
    /// otherwise its `<testsuite>` records are appended unchanged and the
    /// single-unit file is removed. Returns the number of top-level suites now
    /// in progress.
    #[instrument(skip_all, fields(partial = %self.single_unit.display()))]
    pub fn fold_in(&self) -> Result<usize, ReportError> {
        if !self.single_unit.is_file() {
            return Err(ReportError::MissingPartial(self.single_unit.clone()));
        }
        let partial = read_document(&self.single_unit)?;

        if !self.in_progress.is_file() {
            let records =
                suite_records(&partial).map_err(|e| document_error(&self.single_unit, e))?;
            if let Some(parent) = self.in_progress.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&self.single_unit, &self.in_progress)?;
            debug!(records = records.len(), "started in-progress report");
            return Ok(records.len());
        }

        let cumulative = read_document(&self.in_progress)?;
        let (merged, records) = merge_documents(&cumulative, &partial)
            .map_err(|e| document_error(&self.in_progress, e))?;
        let staging = self.in_progress.with_extension("xml.tmp");
        fs::write(&staging, merged)?;
        fs::rename(&staging, &self.in_progress)?;
        fs::remove_file(&self.single_unit)?;

        debug!(records, "folded partial report");
        Ok(records)
    }

    /// Promote the in-progress document to the complete slot, replacing any older
    /// complete document. Without an in-progress document this does nothing.
    /// Returns whether a document was promoted.
    #[instrument(skip_all, fields(complete = %self.complete.display()))]
    pub fn finalize(&self) -> Result<bool, ReportError> {
        if !self.in_progress.is_file() {
            debug!("nothing in progress, complete report left as is");
            return Ok(false);
        }
        fs::rename(&self.in_progress, &self.complete)?;
        info!("report finalized");
        Ok(true)
    }
}

/// Read a report and check that it parses as JUnit
fn read_document(path: &Path) -> Result<String, ReportError> {
    let xml = fs::read_to_string(path)?;
    JUnitReport::parse(&xml).map_err(|e| document_error(path, e))?;
    Ok(xml)
}

fn document_error(path: &Path, err: ReportError) -> ReportError {
    match err {
        ReportError::Io(e) => ReportError::Io(e),
        other => ReportError::Document {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

/// Report errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// IO error
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML syntax error
    #[error("Invalid report XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Well-formed XML that is not a JUnit document
    #[error("Malformed report: {0}")]
    Malformed(String),

    /// A report file could not be parsed
    #[error("Cannot read report {path}: {message}")]
    Document { path: PathBuf, message: String },

    /// A sub-unit did not leave a report behind
    #[error("Expected a report at {0}")]
    MissingPartial(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PYTEST_OUTPUT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites><testsuite name="pytest" errors="0" failures="1" skipped="0" tests="2" time="0.042" timestamp="2024-05-01T10:00:00.000000" hostname="ci"><testcase classname="test.feature_tests.test_1_login" name="test_login" time="0.020" /><testcase classname="test.feature_tests.test_1_login" name="test_logout" time="0.022"><failure message="assert 1 == 2">def test_logout():
&gt;       assert 1 == 2</failure></testcase></testsuite></testsuites>"#;

    fn partial(name: &str, cases: usize) -> JUnitReport {
        JUnitReport {
            name: "pytest".to_string(),
            testsuites: vec![JUnitTestSuite {
                name: name.to_string(),
                tests: cases,
                time: 0.5,
                testcases: (0..cases)
                    .map(|i| JUnitTestCase {
                        name: format!("test_{}", i),
                        classname: name.to_string(),
                        time: 0.1,
                        outcome: CaseOutcome::Passed,
                    })
                    .collect(),
                ..Default::default()
            }],
        }
    }

    fn slots(temp: &TempDir) -> IncrementalReport {
        let dir = temp.path().join("reports");
        IncrementalReport::new(
            dir.join("demo_core_feature_tests_single_file.xml"),
            dir.join("demo_core_feature_tests_incomplete.xml"),
            dir.join("demo_core_feature_tests_complete.xml"),
        )
    }

    #[test]
    fn test_parse_pytest_output() {
        let report = JUnitReport::parse(PYTEST_OUTPUT).unwrap();

        assert_eq!(report.testsuites.len(), 1);
        let suite = &report.testsuites[0];
        assert_eq!(suite.tests, 2);
        assert_eq!(suite.failures, 1);
        assert_eq!(suite.timestamp.as_deref(), Some("2024-05-01T10:00:00.000000"));
        match &suite.testcases[1].outcome {
            CaseOutcome::Failure(f) => {
                assert_eq!(f.message, "assert 1 == 2");
                assert!(f.content.contains(">       assert 1 == 2"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_testsuite_root() {
        let xml = r#"<testsuite name="unit" tests="1"><testcase name="a" classname="m"><skipped message="later"/></testcase></testsuite>"#;
        let report = JUnitReport::parse(xml).unwrap();

        assert_eq!(report.testsuites.len(), 1);
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn test_parse_rejects_non_junit() {
        assert!(matches!(
            JUnitReport::parse("<coverage/>"),
            Err(ReportError::Malformed(_))
        ));
        assert!(JUnitReport::parse("<testsuites><testsuite></testsuites>").is_err());
    }

    #[test]
    fn test_xml_output_reparses() {
        let report = JUnitReport::parse(PYTEST_OUTPUT).unwrap();
        let xml = report.to_xml();

        assert!(xml.contains("<testsuites name=\"\" tests=\"2\" failures=\"1\""));
        assert!(xml.contains("&gt;       assert 1 == 2"));
        assert_eq!(JUnitReport::parse(&xml).unwrap().testsuites, report.testsuites);
    }

    #[test]
    fn test_first_fold_in_moves_partial() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);
        assert_eq!(report.state(), ReportState::NoDocument);

        partial("login", 2).write(report.single_unit_path()).unwrap();
        assert_eq!(report.fold_in().unwrap(), 1);

        assert_eq!(report.state(), ReportState::InProgress);
        assert!(!report.single_unit_path().exists());
    }

    #[test]
    fn test_record_count_is_sum_of_partials() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);

        for (i, name) in ["login", "logout", "signup"].iter().enumerate() {
            partial(name, i + 1).write(report.single_unit_path()).unwrap();
            report.fold_in().unwrap();
        }
        assert!(report.finalize().unwrap());

        let complete = JUnitReport::read(report.complete_path()).unwrap();
        assert_eq!(complete.testsuites.len(), 3);
        assert_eq!(complete.tests(), 1 + 2 + 3);
        assert_eq!(report.state(), ReportState::Complete);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);
        partial("login", 1).write(report.single_unit_path()).unwrap();
        report.fold_in().unwrap();

        assert!(report.finalize().unwrap());
        let first = fs::read_to_string(report.complete_path()).unwrap();

        assert!(!report.finalize().unwrap());
        assert_eq!(fs::read_to_string(report.complete_path()).unwrap(), first);
    }

    #[test]
    fn test_finalize_replaces_older_complete() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);
        partial("old", 1).write(report.complete_path()).unwrap();

        partial("new", 4).write(report.single_unit_path()).unwrap();
        report.fold_in().unwrap();
        report.finalize().unwrap();

        let complete = JUnitReport::read(report.complete_path()).unwrap();
        assert_eq!(complete.testsuites[0].name, "new");
    }

    #[test]
    fn test_stale_in_progress_is_carried_over() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);
        partial("crashed_run", 2).write(report.in_progress_path()).unwrap();

        partial("login", 1).write(report.single_unit_path()).unwrap();
        assert_eq!(report.fold_in().unwrap(), 2);
        report.finalize().unwrap();

        let complete = JUnitReport::read(report.complete_path()).unwrap();
        let names: Vec<&str> = complete.testsuites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["crashed_run", "login"]);
    }

    #[test]
    fn test_parse_nested_testsuite() {
        let xml = r#"<testsuites><testsuite name="outer" tests="2" time="1.5"><testsuite name="inner" tests="1" time="0.5"><testcase name="a" classname="m" time="0.5"/></testsuite><testcase name="b" classname="m" time="1.0"><failure message="no"/></testcase></testsuite></testsuites>"#;
        let report = JUnitReport::parse(xml).unwrap();

        let names: Vec<&str> = report.testsuites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["inner", "outer"]);
        assert_eq!(report.testsuites[1].testcases[0].name, "b");
        assert_eq!(report.tests(), 2);
        assert_eq!(report.failures(), 1);
        assert!((report.time() - 1.5).abs() < 1e-9);
    }

    fn captured_output(suite: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites><testsuite name="{suite}" tests="1" hostname="ci"><properties><property name="seed" value="42"/></properties><testcase name="t" classname="c" file="test/{suite}.py" line="7"><system-out>captured stdout</system-out></testcase><system-err>captured stderr</system-err></testsuite></testsuites>"#
        )
    }

    #[test]
    fn test_fold_in_keeps_record_content() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);
        fs::create_dir_all(report.single_unit_path().parent().unwrap()).unwrap();

        for suite in ["login", "logout"] {
            fs::write(report.single_unit_path(), captured_output(suite)).unwrap();
            report.fold_in().unwrap();
        }
        report.finalize().unwrap();

        let xml = fs::read_to_string(report.complete_path()).unwrap();
        assert_eq!(xml.matches("captured stdout").count(), 2);
        assert_eq!(xml.matches("captured stderr").count(), 2);
        assert_eq!(xml.matches(r#"<property name="seed" value="42"/>"#).count(), 2);
        assert_eq!(xml.matches(r#"hostname="ci""#).count(), 2);
        assert!(xml.contains(r#"file="test/login.py" line="7""#));
        assert!(xml.contains(r#"file="test/logout.py" line="7""#));
        assert!(xml.contains(r#"<testsuites name="" tests="2""#));

        let complete = JUnitReport::read(report.complete_path()).unwrap();
        assert_eq!(complete.tests(), 2);
    }

    #[test]
    fn test_fold_in_keeps_nested_suites_together() {
        let temp = TempDir::new().unwrap();
        let report = slots(&temp);
        partial("login", 1).write(report.single_unit_path()).unwrap();
        report.fold_in().unwrap();

        let nested = r#"<testsuite name="outer"><testsuite name="inner"><testcase name="a" classname="m"/></testsuite><testcase name="b" classname="m"/></testsuite>"#;
        fs::write(report.single_unit_path(), nested).unwrap();
        assert_eq!(report.fold_in().unwrap(), 2);

        let xml = fs::read_to_string(report.in_progress_path()).unwrap();
        assert!(xml.contains(nested));
        assert_eq!(JUnitReport::read(report.in_progress_path()).unwrap().tests(), 3);
    }

    #[test]
    fn test_fold_in_without_partial() {
        let temp = TempDir::new().unwrap();
        let err = slots(&temp).fold_in().unwrap_err();
        assert!(matches!(err, ReportError::MissingPartial(_)));
    }
}
