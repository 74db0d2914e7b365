use std::fmt;

use serde::{Deserialize, Serialize};

/// One untrusted submission: Pascal source, program arguments and stdin text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    source: String,
    args: String,
    stdin: String,
}

impl Submission {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = stdin.into();
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn stdin(&self) -> &str {
        &self.stdin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    SizeExceeded,
    InvalidCharset,
    StructuralComplexity,
    RestrictedKeyword,
    ExploitPattern,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::SizeExceeded => "SizeExceeded",
            RejectReason::InvalidCharset => "InvalidCharset",
            RejectReason::StructuralComplexity => "StructuralComplexity",
            RejectReason::RestrictedKeyword => "RestrictedKeyword",
            RejectReason::ExploitPattern => "ExploitPattern",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub detail: String,
}

impl Rejection {
    pub fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(r) => Some(r.reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    /// Compiler diagnostics, stdout and stderr interleaved.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The program ran to completion; its own exit status is not an error here.
    Completed(String),
    /// CPU-time or wall-clock ceiling was hit and the process group was killed.
    TimedOut,
    RuntimeError(String),
}

/// Terminal state of one submission, as handed back to the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Outcome {
    Rejected(Rejection),
    CompileFailed(String),
    TimedOut,
    RuntimeError(String),
    Completed(String),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Rejected(_) => "Rejected",
            Outcome::CompileFailed(_) => "CompileFailed",
            Outcome::TimedOut => "TimedOut",
            Outcome::RuntimeError(_) => "RuntimeError",
            Outcome::Completed(_) => "Completed",
        }
    }

    /// Text payload; for rejections this is the detail message.
    pub fn payload(&self) -> &str {
        match self {
            Outcome::Rejected(r) => &r.detail,
            Outcome::CompileFailed(s) | Outcome::RuntimeError(s) | Outcome::Completed(s) => s,
            Outcome::TimedOut => "",
        }
    }
}

impl From<ExecutionOutcome> for Outcome {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Completed(out) => Outcome::Completed(out),
            ExecutionOutcome::TimedOut => Outcome::TimedOut,
            ExecutionOutcome::RuntimeError(msg) => Outcome::RuntimeError(msg),
        }
    }
}
