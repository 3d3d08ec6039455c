//! 테스트용 압축 파일 생성기

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tar::{Builder as TarBuilder, EntryType, Header};
use zip::write::SimpleFileOptions as ZipFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};
use zstd::stream::write::Encoder as ZstdEncoder;

const FIXTURE_MTIME: u64 = 1_700_000_000;

/// `/` 로 끝나는 이름은 디렉터리로 기록한다.
pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])], password: Option<&str>) {
    let file = File::create(path).expect("create zip file");
    let mut writer = ZipWriter::new(file);
    let mut options = ZipFileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(pass) = password {
        options = options.with_aes_encryption(AesMode::Aes256, pass);
    }
    for (name, data) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(name.to_string(), options)
                .expect("add zip directory");
        } else {
            writer
                .start_file(name.to_string(), options)
                .expect("start zip entry");
            writer.write_all(data).expect("write zip entry");
        }
    }
    writer.finish().expect("finish zip");
}

/// 엔트리마다 비밀번호를 따로 지정한다. `None` 이면 암호화하지 않는다.
pub(crate) fn write_zip_mixed(path: &Path, entries: &[(&str, &[u8], Option<&str>)]) {
    let file = File::create(path).expect("create zip file");
    let mut writer = ZipWriter::new(file);
    for (name, data, password) in entries {
        let mut options = ZipFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(pass) = password {
            options = options.with_aes_encryption(AesMode::Aes256, pass);
        }
        writer
            .start_file(name.to_string(), options)
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip");
}

pub(crate) fn write_tar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create tar file");
    let mut builder = TarBuilder::new(file);
    for (name, data) in entries {
        let mut header = Header::new_gnu();
        header.set_mtime(FIXTURE_MTIME);
        if name.ends_with('/') {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, name, io::empty())
                .expect("append tar directory");
        } else {
            header.set_entry_type(EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, *data)
                .expect("append tar file");
        }
    }
    builder.finish().expect("finish tar");
}

pub(crate) fn gzip_file(src: &Path, dest: &Path) {
    let data = fs::read(src).expect("read gzip source");
    let mut encoder = GzEncoder::new(File::create(dest).expect("create gz"), Compression::default());
    encoder.write_all(&data).expect("write gz");
    encoder.finish().expect("finish gz");
}

pub(crate) fn zstd_file(src: &Path, dest: &Path) {
    let data = fs::read(src).expect("read zstd source");
    let mut encoder = ZstdEncoder::new(File::create(dest).expect("create zst"), 3).expect("zstd encoder");
    encoder.write_all(&data).expect("write zst");
    encoder.finish().expect("finish zst");
}

pub(crate) fn write_7z(src_dir: &Path, dest: &Path, password: Option<&str>) {
    match password {
        Some(pass) => sevenz_rust2::compress_to_path_encrypted(
            src_dir,
            dest,
            sevenz_rust2::Password::from(pass),
        )
        .expect("compress encrypted 7z"),
        None => sevenz_rust2::compress_to_path(src_dir, dest).expect("compress 7z"),
    }
}
