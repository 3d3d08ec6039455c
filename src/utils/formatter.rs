// Formatters - 파일 크기, 날짜, 요약 문구 포맷팅

use chrono::{DateTime, Local};
use std::time::SystemTime;

/// 파일 크기를 읽기 쉬운 형식으로 포맷팅 (숫자와 단위 사이 공백)
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// 엔트리 수정 시간 포맷팅 ("YYYY-MM-DD HH:MM", 없으면 16자 공백 정렬된 "-")
pub fn format_entry_date(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => {
            let datetime: DateTime<Local> = time.into();
            datetime.format("%Y-%m-%d %H:%M").to_string()
        }
        None => format!("{:<16}", "-"),
    }
}

/// 개수에 따라 단수/복수형 반환
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// 진행률 계산 (0-100). 바이트 합계가 없으면 파일 수 기준
pub fn percentage(done_bytes: u64, total_bytes: u64, done_files: usize, total_files: usize) -> u8 {
    if total_bytes > 0 {
        ((done_bytes.min(total_bytes) as f64 / total_bytes as f64) * 100.0) as u8
    } else if total_files > 0 {
        ((done_files.min(total_files) as f64 / total_files as f64) * 100.0) as u8
    } else {
        100
    }
}
