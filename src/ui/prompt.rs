//! 터미널 질의 (비밀번호, 덮어쓰기, 저장 위치)
//!
//! 작업자 스레드에서 호출되며, 응답을 기다리는 동안 진행 표시줄을 멈춘다.

use crate::app::{DestinationQuery, OverwriteQuery};
use crate::models::OverwriteMethod;
use crate::system::{FileInfo, PasswordQuery, PasswordReply, PasswordRequest};
use crate::utils::formatter::{format_entry_date, format_file_size};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use indicatif::ProgressBar;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub struct TerminalPrompt {
    bar: ProgressBar,
    /// 대문자 키로 고른 "모두 적용" 결정
    overwrite_all: Mutex<Option<OverwriteMethod>>,
    /// 질의가 키 입력을 쓰는 동안 잡고 있는 잠금
    console: Mutex<()>,
}

impl TerminalPrompt {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            overwrite_all: Mutex::new(None),
            console: Mutex::new(()),
        }
    }

    /// 쌓인 키 입력에 Esc 나 Ctrl+C 가 있는지 확인한다. 질의 중이면 건드리지 않는다.
    pub fn cancel_requested(&self) -> bool {
        let Ok(_console) = self.console.try_lock() else {
            return false;
        };
        let mut cancel = false;
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to poll terminal events");
                    break;
                }
            }
            match next_key() {
                Ok(Some((code, modifiers))) => cancel |= is_cancel_key(code, modifiers),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read terminal event");
                    break;
                }
            }
        }
        cancel
    }

    fn console(&self) -> MutexGuard<'_, ()> {
        self.console.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PasswordQuery for TerminalPrompt {
    fn request(&self, request: &PasswordRequest) -> PasswordReply {
        let _console = self.console();
        let prompt = format!("Password for {}: ", request.source.display());
        match self.bar.suspend(|| read_secret(&prompt)) {
            Ok(Some(value)) => PasswordReply::password(value),
            Ok(None) => PasswordReply::cancelled(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read password");
                PasswordReply::cancelled()
            }
        }
    }
}

impl OverwriteQuery for TerminalPrompt {
    fn resolve(&self, existing: &FileInfo, incoming: &FileInfo) -> OverwriteMethod {
        let mut all = self.overwrite_all.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(method) = *all {
            return method;
        }

        let _console = self.console();
        let folder = existing
            .path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let question = format!(
            "{} already exists in {}\n  existing: {} {}\n  incoming: {} {}\n[s]kip [o]verwrite [r]ename [c]ancel (uppercase applies to all): ",
            existing.name(),
            folder,
            format_file_size(existing.size),
            format_entry_date(existing.modified),
            format_file_size(incoming.size),
            format_entry_date(incoming.modified),
        );
        let answer = self.bar.suspend(|| read_choice(&question));
        match answer {
            Ok(Some((method, apply_all))) => {
                if apply_all {
                    *all = Some(method);
                }
                method
            }
            Ok(None) => OverwriteMethod::Cancel,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read overwrite decision");
                OverwriteMethod::Cancel
            }
        }
    }
}

impl DestinationQuery for TerminalPrompt {
    fn select(&self, source: &Path) -> Option<PathBuf> {
        let _console = self.console();
        let prompt = format!("Extract {} to (empty to cancel): ", source.display());
        match self.bar.suspend(|| read_line(&prompt)) {
            Ok(line) if !line.trim().is_empty() => Some(PathBuf::from(line.trim())),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read destination");
                None
            }
        }
    }
}

/// 터미널 모드를 바꾸고, drop 될 때 이전 모드로 되돌린다.
pub struct TerminalMode {
    restore: Option<bool>,
}

impl TerminalMode {
    pub fn raw() -> io::Result<Self> {
        Self::set(true)
    }

    pub fn cooked() -> io::Result<Self> {
        Self::set(false)
    }

    fn set(raw: bool) -> io::Result<Self> {
        let was_raw = terminal::is_raw_mode_enabled()?;
        if was_raw == raw {
            return Ok(Self { restore: None });
        }
        apply_mode(raw)?;
        Ok(Self {
            restore: Some(was_raw),
        })
    }
}

impl Drop for TerminalMode {
    fn drop(&mut self) {
        if let Some(raw) = self.restore {
            let _ = apply_mode(raw);
        }
    }
}

fn apply_mode(raw: bool) -> io::Result<()> {
    if raw {
        terminal::enable_raw_mode()
    } else {
        terminal::disable_raw_mode()
    }
}

/// 줄바꿈이 제대로 나오도록 일반 모드에서 출력
fn write_prompt(text: &str) -> io::Result<()> {
    let _cooked = TerminalMode::cooked()?;
    let mut stderr = io::stderr();
    write!(stderr, "{}", text)?;
    stderr.flush()
}

/// 입력을 숨긴 채 한 줄 읽기. Esc, Ctrl+C 는 `None`
fn read_secret(prompt: &str) -> io::Result<Option<String>> {
    write_prompt(prompt)?;
    let result = {
        let _raw = TerminalMode::raw()?;
        read_secret_raw()
    };
    write_prompt("\n")?;
    result
}

fn read_secret_raw() -> io::Result<Option<String>> {
    let mut value = String::new();
    loop {
        let Some((code, modifiers)) = next_key()? else {
            continue;
        };
        if is_cancel_key(code, modifiers) {
            return Ok(None);
        }
        match code {
            KeyCode::Enter => return Ok(Some(value)),
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char(c) => value.push(c),
            _ => {}
        }
    }
}

/// 덮어쓰기 선택 키 하나 읽기. 대문자면 모두 적용
fn read_choice(question: &str) -> io::Result<Option<(OverwriteMethod, bool)>> {
    write_prompt(question)?;
    let result = {
        let _raw = TerminalMode::raw()?;
        read_choice_raw()
    };
    write_prompt("\n")?;
    result
}

fn read_choice_raw() -> io::Result<Option<(OverwriteMethod, bool)>> {
    loop {
        let Some((code, modifiers)) = next_key()? else {
            continue;
        };
        if is_cancel_key(code, modifiers) {
            return Ok(None);
        }
        if let KeyCode::Char(c) = code {
            if let Some(choice) = parse_choice(c) {
                return Ok(Some(choice));
            }
        }
    }
}

fn parse_choice(c: char) -> Option<(OverwriteMethod, bool)> {
    let method = match c.to_ascii_lowercase() {
        's' => OverwriteMethod::Skip,
        'o' => OverwriteMethod::Overwrite,
        'r' => OverwriteMethod::Rename,
        'c' => OverwriteMethod::Cancel,
        _ => return None,
    };
    Some((method, c.is_ascii_uppercase() && method != OverwriteMethod::Cancel))
}

fn is_cancel_key(code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Esc => true,
        KeyCode::Char('c') => modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn next_key() -> io::Result<Option<(KeyCode, KeyModifiers)>> {
    match event::read()? {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) => Ok(Some((code, modifiers))),
        _ => Ok(None),
    }
}

fn read_line(prompt: &str) -> io::Result<String> {
    let _cooked = TerminalMode::cooked()?;
    let mut stderr = io::stderr();
    write!(stderr, "{}", prompt)?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
