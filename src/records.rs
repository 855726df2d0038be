use crate::error::{RecorderError, RecorderResult};
use crate::utils::format_size;
use chrono::Local;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

/// 一条本地录像记录
#[derive(Debug, Clone)]
pub struct RecordingEntry {
    pub name: String,
    pub size_bytes: u64,
}

impl RecordingEntry {
    /// 人类可读的文件大小
    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// 本地录像目录
///
/// 磁盘上的录像文件是会话唯一的持久产物；目录下还包含
/// `logs/` 子目录存放追加式状态日志。
#[derive(Debug, Clone)]
pub struct RecordsDir {
    root: PathBuf,
}

impl RecordsDir {
    /// 打开录像目录，不存在时创建（连同 logs 子目录）
    pub fn open(root: impl Into<PathBuf>) -> RecorderResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).map_err(|e| {
            RecorderError::FileError(format!("无法创建录像目录 {}: {}", root.display(), e))
        })?;
        fs::create_dir_all(root.join("logs")).map_err(|e| {
            RecorderError::FileError(format!("无法创建日志目录: {}", e))
        })?;

        Ok(RecordsDir { root })
    }

    /// 录像目录路径
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 日志子目录路径
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// 生成下一个分段的本地文件路径（文件名编码采集开始时间）
    pub fn next_segment_path(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        self.root.join(format!("record_{}.mp4", timestamp))
    }

    /// 按文件名排序列出全部录像
    pub fn list(&self) -> RecorderResult<Vec<RecordingEntry>> {
        let pattern = self.root.join("*.mp4");
        let pattern = pattern.to_string_lossy();

        let paths = glob::glob(&pattern)
            .map_err(|e| RecorderError::FileError(format!("无法匹配录像文件: {}", e)))?;

        let mut entries = Vec::new();
        for path in paths {
            let path = match path {
                Ok(path) => path,
                Err(e) => {
                    warn!("无法访问录像文件: {}", e);
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            entries.push(RecordingEntry { name, size_bytes });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// 录像文件数量
    pub fn count(&self) -> usize {
        self.list().map(|entries| entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_root_and_logs_dir() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let records = RecordsDir::open(tmp.path().join("records")).expect("open 失败");

        assert!(records.root().is_dir());
        assert!(records.logs_dir().is_dir());
    }

    #[test]
    fn empty_dir_lists_zero_recordings() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let records = RecordsDir::open(tmp.path()).expect("open 失败");

        assert_eq!(records.count(), 0);
        assert!(records.list().expect("list 失败").is_empty());
    }

    #[test]
    fn lists_only_media_files_with_sizes() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let records = RecordsDir::open(tmp.path()).expect("open 失败");

        fs::write(tmp.path().join("record_20250101_120000.mp4"), b"fake video").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"not a recording").unwrap();

        let entries = records.list().expect("list 失败");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "record_20250101_120000.mp4");
        assert!(entries[0].size_bytes > 0);
        assert_eq!(entries[0].display_size(), "10 B");
    }

    #[test]
    fn segment_paths_use_timestamp_naming() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let records = RecordsDir::open(tmp.path()).expect("open 失败");

        let path = records.next_segment_path();
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("record_"));
        assert!(name.ends_with(".mp4"));
    }
}
