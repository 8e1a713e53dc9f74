use url::Url;

use crate::error::SbResult;

pub fn join_url(base_url: &str, path: &str) -> SbResult<Url> {
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
    let joined = base.join(path.trim_start_matches('/'))?;

    Ok(joined)
}
