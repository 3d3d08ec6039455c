//! 암호화된 엔트리를 만났을 때 엔진이 호출하는 비밀번호 콜백
//!
//! 엔진은 동기적으로 비밀번호를 요구하고, 콜백은 [`PasswordQuery`] 구현체에
//! 질의를 위임한 뒤 응답을 세 가지 결과 중 하나로 분류한다.

use super::MAX_PASSWORD_ATTEMPTS;
use crate::utils::error::{IceError, Result};
use std::cell::Cell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// 비밀번호 질의 요청 (압축 파일 경로)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRequest {
    pub source: PathBuf,
}

/// 질의 구현체의 응답
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordReply {
    pub cancel: bool,
    pub value: String,
}

impl PasswordReply {
    pub fn password(value: impl Into<String>) -> Self {
        Self {
            cancel: false,
            value: value.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancel: true,
            value: String::new(),
        }
    }
}

/// 엔진에 돌려주는 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordOutcome {
    Ok,
    UserCancel,
    WrongPassword,
}

impl PasswordOutcome {
    /// 엔진 상태 코드
    pub fn code(&self) -> i32 {
        match self {
            PasswordOutcome::Ok => 0,
            PasswordOutcome::WrongPassword => 9,
            PasswordOutcome::UserCancel => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResult {
    pub outcome: PasswordOutcome,
    pub password: String,
}

/// 비밀번호 질의 추상화 (사용자 입력, 캐시, 고정값 등)
pub trait PasswordQuery: Send + Sync {
    fn request(&self, request: &PasswordRequest) -> PasswordReply;
}

impl<F> PasswordQuery for F
where
    F: Fn(&PasswordRequest) -> PasswordReply + Send + Sync,
{
    fn request(&self, request: &PasswordRequest) -> PasswordReply {
        self(request)
    }
}

/// 고정 비밀번호 (없으면 빈 값 → WrongPassword)
#[derive(Debug, Clone, Default)]
pub struct StaticPassword(pub Option<String>);

impl PasswordQuery for StaticPassword {
    fn request(&self, _request: &PasswordRequest) -> PasswordReply {
        PasswordReply::password(self.0.clone().unwrap_or_default())
    }
}

/// 첫 번째로 성공한 응답을 기억하는 질의 래퍼
///
/// 같은 압축 파일이 다시 물어보면 기억한 값이 틀렸다는 뜻이므로 캐시를 버리고
/// 내부 질의로 넘어간다.
pub struct CachedPassword {
    inner: Arc<dyn PasswordQuery>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    value: Option<String>,
    served: HashSet<PathBuf>,
}

impl CachedPassword {
    pub fn new(inner: Arc<dyn PasswordQuery>) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState::default()),
        }
    }
}

impl PasswordQuery for CachedPassword {
    fn request(&self, request: &PasswordRequest) -> PasswordReply {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(value) = state.value.clone() {
                if state.served.insert(request.source.clone()) {
                    return PasswordReply::password(value);
                }
                state.value = None;
            }
        }

        let reply = self.inner.request(request);
        if !reply.cancel && !reply.value.is_empty() {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.value = Some(reply.value.clone());
            state.served.clear();
            state.served.insert(request.source.clone());
        }
        reply
    }
}

/// 엔진 핸들에 설치되는 비밀번호 콜백
pub struct ArchivePasswordCallback {
    source: PathBuf,
    query: Arc<dyn PasswordQuery>,
    result: Cell<Option<PasswordOutcome>>,
}

impl ArchivePasswordCallback {
    pub fn new(source: impl Into<PathBuf>, query: Arc<dyn PasswordQuery>) -> Self {
        Self {
            source: source.into(),
            query,
            result: Cell::new(None),
        }
    }

    /// 마지막 질의 결과
    pub fn result(&self) -> Option<PasswordOutcome> {
        self.result.get()
    }

    /// 질의 1회 수행 후 분류 (취소 > 성공 > 잘못된 비밀번호)
    pub fn get_password(&self) -> PasswordResult {
        let reply = self.query.request(&PasswordRequest {
            source: self.source.clone(),
        });
        let result = classify(reply);
        tracing::debug!(
            source = %self.source.display(),
            status = result.outcome.code(),
            "password callback answered"
        );
        self.result.set(Some(result.outcome));
        result
    }

    /// 엔진 쪽에서 사용하는 형태: OK 가 아니면 에러로 변환
    pub fn require_password(&self) -> Result<String> {
        let result = self.get_password();
        match result.outcome {
            PasswordOutcome::Ok => Ok(result.password),
            PasswordOutcome::UserCancel => Err(IceError::Cancelled),
            PasswordOutcome::WrongPassword => Err(IceError::ArchiveInvalidPassword {
                path: self.source.clone(),
                reason: "Empty password".to_string(),
            }),
        }
    }

    /// 비밀번호가 틀렸을 때 다시 물어보며 `attempt` 를 반복
    ///
    /// `known` 이 있으면 첫 시도에 그대로 사용한다. 성공한 비밀번호는 `known` 에 남긴다.
    pub fn retry<T>(
        &self,
        known: &mut Option<String>,
        mut attempt: impl FnMut(&str) -> Result<T>,
    ) -> Result<T> {
        let mut failures = 0usize;
        loop {
            let password = match known.take() {
                Some(password) => password,
                None => self.require_password()?,
            };
            match attempt(&password) {
                Ok(value) => {
                    *known = Some(password);
                    return Ok(value);
                }
                Err(IceError::ArchiveInvalidPassword { reason, .. }) => {
                    failures += 1;
                    if failures >= MAX_PASSWORD_ATTEMPTS {
                        tracing::debug!(
                            source = %self.source.display(),
                            failures,
                            last = ?self.result(),
                            "password attempts exhausted"
                        );
                        return Err(IceError::ArchiveInvalidPassword {
                            path: self.source.clone(),
                            reason,
                        });
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }
}

fn classify(reply: PasswordReply) -> PasswordResult {
    if reply.cancel {
        PasswordResult {
            outcome: PasswordOutcome::UserCancel,
            password: String::new(),
        }
    } else if !reply.value.is_empty() {
        PasswordResult {
            outcome: PasswordOutcome::Ok,
            password: reply.value,
        }
    } else {
        PasswordResult {
            outcome: PasswordOutcome::WrongPassword,
            password: String::new(),
        }
    }
}
