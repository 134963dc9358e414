//! 错误报告
//!
//! 每次调用至多一个活动错误。分类只用于内部记录，宿主看到的都是同一种负长度编码。

use crate::binary::truncate_with_marker;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 源码编译失败
    Compile,
    /// 运行时错误
    Runtime,
    /// 结果无法编码
    Serialization,
    /// 输入不合法（长度越界等）
    Input,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Compile => "compile",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Input => "input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已捕获的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorState {
    pub kind: ErrorKind,
    /// 已截断到预算内的消息
    pub message: Vec<u8>,
}

impl ErrorState {
    pub fn message_text(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }
}

/// 错误报告器
#[derive(Debug)]
pub struct ErrorReporter {
    budget: usize,
    current: Option<ErrorState>,
}

impl ErrorReporter {
    /// `budget` 是消息（含截断标记）的最大字节数
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            current: None,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// 记录错误，覆盖之前的错误
    ///
    /// 非 UTF-8 字节替换为 U+FFFD，宿主看到的永远是纯文本。
    pub fn capture(&mut self, kind: ErrorKind, message: impl AsRef<[u8]>) -> &ErrorState {
        let text = String::from_utf8_lossy(message.as_ref());
        let message = truncate_with_marker(text.as_bytes(), self.budget);
        tracing::debug!(
            target: "luagate::invoke",
            kind = kind.as_str(),
            len = message.len(),
            "error captured"
        );
        self.current.insert(ErrorState { kind, message })
    }

    /// 记录解释器错误
    pub fn capture_lua(&mut self, kind: ErrorKind, err: &mlua::Error) -> &ErrorState {
        self.capture(kind, lua_error_message(err))
    }

    pub fn current(&self) -> Option<&ErrorState> {
        self.current.as_ref()
    }

    pub fn take(&mut self) -> Option<ErrorState> {
        self.current.take()
    }
}

/// 从解释器错误中提取给宿主看的纯文本
///
/// 回调错误展开到根因，去掉栈回溯。
pub fn lua_error_message(err: &mlua::Error) -> String {
    let text = match err {
        mlua::Error::CallbackError { cause, .. } => return lua_error_message(cause),
        mlua::Error::WithContext { context, cause } => {
            format!("{context}: {}", lua_error_message(cause))
        }
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    strip_traceback(&text).to_string()
}

fn strip_traceback(text: &str) -> &str {
    match text.find("\nstack traceback:") {
        Some(pos) => &text[..pos],
        None => text,
    }
}
