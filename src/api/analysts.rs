use strum::IntoEnumIterator;

use crate::analyst::Analyst;

pub async fn list() -> Vec<Analyst> {
    Analyst::iter().collect()
}
