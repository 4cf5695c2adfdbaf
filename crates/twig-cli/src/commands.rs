//! CLI command implementations.
//!
//! Every command writes its normal output to the given writer so that
//! `main` can hand it stdout and tests can hand it a buffer.

use crate::config::Config;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use twig_git::{clone_repository, GitError, HttpTransport, Transport, TransportClient};
use twig_storage::{
    build_tree, Commit, CommitMetadata, ObjectId, ObjectType, Repository, StorageError, Tree,
};

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Git(#[from] GitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// What `cat-file` prints about an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    /// The payload, with trees shown as `ls-tree` lines.
    Pretty,
    /// The object kind.
    Kind,
    /// The payload length.
    Size,
}

/// Initialize a repository at `path`.
pub fn init(path: &Path, out: &mut impl Write) -> Result<()> {
    let repo = Repository::init(path)?;
    writeln!(
        out,
        "Initialized empty Twig repository in {}",
        repo.metadata_dir().display()
    )?;
    Ok(())
}

/// Print an object from the repository containing `cwd`.
pub fn cat_file(
    cwd: &Path,
    config: &Config,
    mode: CatFileMode,
    object: &str,
    out: &mut impl Write,
) -> Result<()> {
    let repo = open(cwd, config)?;
    let id = parse_id(object)?;
    let object = repo.objects.get(&id)?;

    match mode {
        CatFileMode::Kind => writeln!(out, "{}", object.object_type)?,
        CatFileMode::Size => writeln!(out, "{}", object.size())?,
        CatFileMode::Pretty if object.object_type == ObjectType::Tree => {
            write_tree_listing(&Tree::parse(&object.data)?, false, out)?;
        }
        CatFileMode::Pretty => out.write_all(&object.data)?,
    }
    Ok(())
}

/// Print the blob id of `file`, storing the blob when `write` is set.
pub fn hash_object(
    cwd: &Path,
    config: &Config,
    file: &Path,
    write: bool,
    out: &mut impl Write,
) -> Result<()> {
    let content = fs::read(cwd.join(file))?;
    let id = if write {
        open(cwd, config)?.objects.put_blob(&content)?
    } else {
        ObjectId::hash_object(ObjectType::Blob, &content)
    };
    writeln!(out, "{}", id)?;
    Ok(())
}

/// List the entries of a tree, or of a commit's root tree.
pub fn ls_tree(
    cwd: &Path,
    config: &Config,
    object: &str,
    name_only: bool,
    out: &mut impl Write,
) -> Result<()> {
    let repo = open(cwd, config)?;
    let id = parse_id(object)?;
    let object = repo.objects.get(&id)?;

    let tree_id = match object.object_type {
        ObjectType::Tree => id,
        ObjectType::Commit => Commit::parse(&object.data)?.tree,
        other => {
            return Err(CliError::InvalidArgument(format!(
                "{} is a {}, not a tree",
                id, other
            )))
        }
    };
    let tree = Tree::parse(&repo.objects.get_typed(&tree_id, ObjectType::Tree)?)?;
    write_tree_listing(&tree, name_only, out)
}

/// Snapshot the work tree and print the root tree id.
pub fn write_tree(cwd: &Path, config: &Config, out: &mut impl Write) -> Result<()> {
    let repo = open(cwd, config)?;
    let id = build_tree(&repo.objects, repo.work_tree())?;
    writeln!(out, "{}", id)?;
    Ok(())
}

/// Create a commit object and print its id.
///
/// `date` is seconds since the epoch; the system clock is used when it is
/// absent.
pub fn commit_tree(
    cwd: &Path,
    config: &Config,
    tree: &str,
    parent: Option<&str>,
    message: &str,
    date: Option<i64>,
    out: &mut impl Write,
) -> Result<()> {
    let repo = open(cwd, config)?;

    let tree = parse_id(tree)?;
    repo.objects.get_typed(&tree, ObjectType::Tree)?;
    let parent = parent.map(parse_id).transpose()?;
    if let Some(parent) = &parent {
        repo.objects.get_typed(parent, ObjectType::Commit)?;
    }

    let timestamp = date.unwrap_or_else(now);
    let metadata = CommitMetadata::single(config.signature(timestamp)?);
    let commit = Commit::new(tree, parent, metadata, message);
    let id = repo.objects.put(ObjectType::Commit, &commit.encode())?;

    tracing::info!(id = %id, tree = %tree, "created commit");
    writeln!(out, "{}", id)?;
    Ok(())
}

/// Clone `url` over HTTP into `dir`, or a directory named after the URL.
pub fn clone(
    cwd: &Path,
    config: &Config,
    url: &str,
    dir: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let transport = HttpTransport::new(&config.http_options())?;
    clone_with(&TransportClient::new(transport), cwd, config, url, dir, out)
}

fn clone_with<T: Transport>(
    client: &TransportClient<T>,
    cwd: &Path,
    config: &Config,
    url: &str,
    dir: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let dest = match dir {
        Some(dir) => cwd.join(dir),
        None => cwd.join(default_clone_dir(url)?),
    };
    if dest.exists() && fs::read_dir(&dest)?.next().is_some() {
        return Err(CliError::InvalidArgument(format!(
            "destination {} already exists and is not empty",
            dest.display()
        )));
    }

    writeln!(out, "Cloning into '{}'...", dest.display())?;
    let summary = clone_repository(client, url, &dest, config.core.compression)?;

    if summary.refs == 0 {
        writeln!(out, "warning: You appear to have cloned an empty repository.")?;
        return Ok(());
    }
    match summary.head {
        Some(head) => writeln!(
            out,
            "Fetched {} objects and {} refs; checked out {} files at {}",
            summary.objects, summary.refs, summary.files, head
        )?,
        None => writeln!(
            out,
            "Fetched {} objects and {} refs; remote HEAD is unknown, nothing checked out",
            summary.objects, summary.refs
        )?,
    }
    Ok(())
}

/// Directory name `clone` uses when none is given: the last path segment
/// of `url` without a `.git` suffix.
pub fn default_clone_dir(url: &str) -> Result<PathBuf> {
    let trimmed = url.trim_end_matches('/');
    let segment = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    let name = segment.strip_suffix(".git").unwrap_or(segment);

    if name.is_empty() || name == "." || name == ".." {
        return Err(CliError::InvalidArgument(format!(
            "cannot derive a directory name from {}",
            url
        )));
    }
    Ok(PathBuf::from(name))
}

fn open(cwd: &Path, config: &Config) -> Result<Repository> {
    Ok(Repository::discover(cwd)?.with_compression(config.core.compression))
}

fn parse_id(s: &str) -> Result<ObjectId> {
    ObjectId::from_hex(s)
        .map_err(|_| CliError::InvalidArgument(format!("not a valid object id: {}", s)))
}

fn write_tree_listing(tree: &Tree, name_only: bool, out: &mut impl Write) -> Result<()> {
    for entry in tree.entries() {
        if name_only {
            writeln!(out, "{}", entry.name)?;
        } else {
            writeln!(
                out,
                "{:0>6} {} {}\t{}",
                entry.mode.as_str(),
                entry.mode.object_kind(),
                entry.id,
                entry.name
            )?;
        }
    }
    Ok(())
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;
    use twig_git::{PackBuilder, PktLine};
    use twig_storage::Signature;

    const HELLO_BLOB: &str = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad";

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn config_with_identity() -> Config {
        Config::parse(
            "[user]\nname = \"Test User\"\nemail = \"test@example.com\"\ntimezone = \"+0200\"\n",
        )
        .unwrap()
    }

    fn repo_with_files() -> TempDir {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("hello.txt"), "hello world\n").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        dir
    }

    #[test]
    fn test_init() {
        let dir = TempDir::new().unwrap();
        let text = output(|out| init(dir.path(), out));
        assert!(text.starts_with("Initialized empty Twig repository in"));
        assert!(dir.path().join(".git/objects").is_dir());

        let mut sink = Vec::new();
        assert!(matches!(
            init(dir.path(), &mut sink),
            Err(CliError::Storage(StorageError::AlreadyExists(_)))
        ));
    }

    #[test]
    fn test_hash_object_without_write() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hello.txt"), "hello world\n").unwrap();

        let config = Config::default();
        let text =
            output(|out| hash_object(dir.path(), &config, Path::new("hello.txt"), false, out));
        assert_eq!(text, format!("{}\n", HELLO_BLOB));
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    fn test_hash_object_write_from_subdirectory() {
        let dir = repo_with_files();
        let config = Config::default();
        let src = dir.path().join("src");

        let text = output(|out| hash_object(&src, &config, Path::new("../hello.txt"), true, out));
        assert_eq!(text.trim(), HELLO_BLOB);

        let repo = Repository::open(dir.path()).unwrap();
        assert!(repo.objects.contains(&ObjectId::from_hex(HELLO_BLOB).unwrap()));
    }

    #[test]
    fn test_write_tree_and_ls_tree() {
        let dir = repo_with_files();
        let config = Config::default();

        let tree = output(|out| write_tree(dir.path(), &config, out));
        let tree = tree.trim();

        let listing = output(|out| ls_tree(dir.path(), &config, tree, false, out));
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("100644 blob {}\thello.txt", HELLO_BLOB));
        assert!(lines[1].starts_with("040000 tree "));
        assert!(lines[1].ends_with("\tsrc"));

        let names = output(|out| ls_tree(dir.path(), &config, tree, true, out));
        assert_eq!(names, "hello.txt\nsrc\n");

        let pretty = output(|out| cat_file(dir.path(), &config, CatFileMode::Pretty, tree, out));
        assert_eq!(pretty, listing);
    }

    #[test]
    fn test_cat_file_blob() {
        let dir = repo_with_files();
        let config = Config::default();
        output(|out| hash_object(dir.path(), &config, Path::new("hello.txt"), true, out));

        let pretty =
            output(|out| cat_file(dir.path(), &config, CatFileMode::Pretty, HELLO_BLOB, out));
        assert_eq!(pretty, "hello world\n");
        let kind = output(|out| cat_file(dir.path(), &config, CatFileMode::Kind, HELLO_BLOB, out));
        assert_eq!(kind, "blob\n");
        let size = output(|out| cat_file(dir.path(), &config, CatFileMode::Size, HELLO_BLOB, out));
        assert_eq!(size, "12\n");
    }

    #[test]
    fn test_cat_file_rejects_bad_id() {
        let dir = repo_with_files();
        let mut sink = Vec::new();
        let result = cat_file(
            dir.path(),
            &Config::default(),
            CatFileMode::Pretty,
            "not-a-hash",
            &mut sink,
        );
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_commit_tree() {
        let dir = repo_with_files();
        let config = config_with_identity();
        let tree = output(|out| write_tree(dir.path(), &config, out));
        let tree = tree.trim();

        let first = output(|out| {
            commit_tree(dir.path(), &config, tree, None, "initial", Some(1_700_000_000), out)
        });
        let first = first.trim();
        let second = output(|out| {
            commit_tree(
                dir.path(),
                &config,
                tree,
                Some(first),
                "second",
                Some(1_700_000_100),
                out,
            )
        });

        let repo = Repository::open(dir.path()).unwrap();
        let payload = repo
            .objects
            .get_typed(&ObjectId::from_hex(second.trim()).unwrap(), ObjectType::Commit)
            .unwrap();
        let commit = Commit::parse(&payload).unwrap();
        assert_eq!(commit.tree.to_hex(), tree);
        assert_eq!(commit.parents, vec![ObjectId::from_hex(first).unwrap()]);
        assert_eq!(commit.message.trim_end(), "second");
        assert_eq!(
            commit.author,
            Signature::new("Test User", "test@example.com", 1_700_000_100, "+0200")
        );

        let listing = output(|out| ls_tree(dir.path(), &config, first, true, out));
        assert_eq!(listing, "hello.txt\nsrc\n");
    }

    #[test]
    fn test_commit_tree_requires_identity() {
        let dir = repo_with_files();
        let tree = output(|out| write_tree(dir.path(), &Config::default(), out));

        let mut sink = Vec::new();
        let result = commit_tree(
            dir.path(),
            &Config::default(),
            tree.trim(),
            None,
            "msg",
            None,
            &mut sink,
        );
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_commit_tree_rejects_non_tree() {
        let dir = repo_with_files();
        let config = config_with_identity();
        output(|out| hash_object(dir.path(), &config, Path::new("hello.txt"), true, out));

        let mut sink = Vec::new();
        let result = commit_tree(dir.path(), &config, HELLO_BLOB, None, "msg", None, &mut sink);
        assert!(matches!(
            result,
            Err(CliError::Storage(StorageError::MalformedObject(_)))
        ));
    }

    #[test]
    fn test_commands_outside_repository() {
        let dir = TempDir::new().unwrap();
        let mut sink = Vec::new();
        assert!(matches!(
            write_tree(dir.path(), &Config::default(), &mut sink),
            Err(CliError::Storage(StorageError::NotARepository(_)))
        ));
    }

    #[test]
    fn test_default_clone_dir() {
        let cases = [
            ("https://example.com/org/project.git", "project"),
            ("https://example.com/org/project", "project"),
            ("https://example.com/org/project.git/", "project"),
            ("git@example.com:project.git", "project"),
        ];
        for (url, expected) in cases {
            assert_eq!(default_clone_dir(url).unwrap(), PathBuf::from(expected));
        }
        assert!(matches!(
            default_clone_dir("https://example.com/.git"),
            Err(CliError::InvalidArgument(_))
        ));
    }

    struct EmptyRemote;

    impl Transport for EmptyRemote {
        fn get(&self, _url: &str) -> twig_git::Result<Bytes> {
            let mut body = PktLine::from_string("# service=git-upload-pack\n").encode();
            body.extend(PktLine::Flush.encode());
            body.extend(
                PktLine::from_string(&format!(
                    "{} capabilities^{{}}\0agent=git/2.45\n",
                    "0".repeat(40)
                ))
                .encode(),
            );
            body.extend(PktLine::Flush.encode());
            Ok(Bytes::from(body))
        }

        fn post(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            _body: Vec<u8>,
        ) -> twig_git::Result<Bytes> {
            Err(GitError::Transport(format!("unexpected fetch from {}", url)))
        }
    }

    #[test]
    fn test_clone_empty_remote() {
        let dir = TempDir::new().unwrap();
        let client = TransportClient::new(EmptyRemote);

        let text = output(|out| {
            clone_with(
                &client,
                dir.path(),
                &Config::default(),
                "https://example.com/empty.git",
                None,
                out,
            )
        });
        assert!(text.contains("empty repository"));
        assert!(dir.path().join("empty/.git/objects").is_dir());
    }

    /// Advertises one branch but no `HEAD`, and serves a raw pack.
    struct HeadlessRemote {
        branch_tip: ObjectId,
        pack: Vec<u8>,
    }

    impl Transport for HeadlessRemote {
        fn get(&self, _url: &str) -> twig_git::Result<Bytes> {
            let mut body = PktLine::from_string("# service=git-upload-pack\n").encode();
            body.extend(PktLine::Flush.encode());
            body.extend(
                PktLine::from_string(&format!(
                    "{} refs/heads/main\0agent=git/2.45\n",
                    self.branch_tip
                ))
                .encode(),
            );
            body.extend(PktLine::Flush.encode());
            Ok(Bytes::from(body))
        }

        fn post(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
            _body: Vec<u8>,
        ) -> twig_git::Result<Bytes> {
            Ok(Bytes::from(self.pack.clone()))
        }
    }

    #[test]
    fn test_clone_without_head_is_not_reported_empty() {
        let blob = ObjectId::hash_object(ObjectType::Blob, b"payload\n");
        let pack = PackBuilder::new()
            .add_object(ObjectType::Blob, b"payload\n".to_vec())
            .build()
            .unwrap();
        let client = TransportClient::new(HeadlessRemote {
            branch_tip: blob,
            pack,
        });

        let dir = TempDir::new().unwrap();
        let text = output(|out| {
            clone_with(
                &client,
                dir.path(),
                &Config::default(),
                "https://example.com/headless.git",
                None,
                out,
            )
        });
        assert!(!text.contains("empty repository"), "{text}");
        assert!(text.contains("Fetched 1 objects and 1 refs"), "{text}");

        let repo = Repository::open(dir.path().join("headless")).unwrap();
        assert!(repo.objects.contains(&blob));
    }

    #[test]
    fn test_clone_refuses_non_empty_destination() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("taken")).unwrap();
        fs::write(dir.path().join("taken/file"), "x").unwrap();

        let mut sink = Vec::new();
        let result = clone_with(
            &TransportClient::new(EmptyRemote),
            dir.path(),
            &Config::default(),
            "https://example.com/whatever.git",
            Some(Path::new("taken")),
            &mut sink,
        );
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }
}
