//! Cloning a remote repository into a new directory.

use crate::delta::resolve_records;
use crate::pack::PackDecoder;
use crate::transport::{extract_pack, Transport, TransportClient};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use twig_storage::{
    materialize, Commit, CompressionLevel, ObjectId, ObjectType, RefStore, Repository,
};

/// What a clone produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneSummary {
    /// Objects written to the store, deltas included.
    pub objects: usize,
    /// Ref files written, HEAD excluded.
    pub refs: usize,
    /// Commit checked out into the work tree.
    pub head: Option<ObjectId>,
    /// Files written to the work tree.
    pub files: usize,
}

/// Clones `url` into `dest`.
///
/// `dest` becomes a fresh repository holding every advertised ref and the
/// objects they reach, with HEAD's tree checked out. The whole operation
/// is one discovery, one fetch, and one pass over the pack.
pub fn clone_repository<T: Transport>(
    client: &TransportClient<T>,
    url: &str,
    dest: &Path,
    compression: CompressionLevel,
) -> Result<CloneSummary> {
    let repo = Repository::init(dest)?.with_compression(compression);
    let advertisement = client.discover_refs(url)?;
    let mut summary = CloneSummary::default();

    let mut refs = BTreeMap::new();
    for (name, id) in &advertisement.refs {
        if RefStore::is_valid_name(name) {
            refs.insert(name.as_str(), *id);
        } else {
            tracing::warn!(name = %name, "skipping advertised ref outside refs/");
        }
    }

    for (name, id) in &refs {
        if *name != "HEAD" {
            repo.refs.set(name, *id)?;
            summary.refs += 1;
        }
    }

    let head = refs.get("HEAD").copied();
    match (advertisement.head_target(), head) {
        (Some(target), _) if target != "HEAD" && refs.contains_key(target.as_str()) => {
            repo.refs.set_symbolic("HEAD", &target)?;
        }
        (_, Some(id)) => repo.refs.set("HEAD", id)?,
        _ => {}
    }

    if refs.is_empty() {
        tracing::info!(url, "remote has no refs; leaving an empty repository");
        return Ok(summary);
    }

    let wants: Vec<ObjectId> = refs
        .values()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let body = client.fetch_pack(url, &wants)?;
    let pack = extract_pack(&body)?;

    let records = PackDecoder::new(&pack).decode()?;
    summary.objects = resolve_records(&repo.objects, &records)?.len();

    let Some(head) = head else {
        tracing::warn!(url, "remote did not advertise HEAD; skipping checkout");
        return Ok(summary);
    };
    let commit = Commit::parse(&repo.objects.get_typed(&head, ObjectType::Commit)?)?;
    summary.files = materialize(&repo.objects, &commit.tree, dest)?;
    summary.head = Some(head);

    tracing::info!(
        dest = %dest.display(),
        objects = summary.objects,
        refs = summary.refs,
        files = summary.files,
        "clone complete"
    );
    Ok(summary)
}
