// 형식별 엔진 핸들 구현
pub(super) mod sevenz;
pub(super) mod stream;
pub(super) mod tarball;
pub(super) mod zipfile;

use crate::utils::error::{IceError, Result};

pub(super) fn check_index(index: usize, count: usize) -> Result<()> {
    if index < count {
        Ok(())
    } else {
        Err(IceError::IndexOutOfRange { index, count })
    }
}
