use af_core::{BuildRef, Error, FileSpec, FindQuery};

/// Print the query `file` sends to the search service. Nothing is contacted,
/// so symbolic build numbers are printed as given.
pub fn run_query(file: &FileSpec) -> Result<(), Error> {
    println!("{}", find_query(file)?);
    Ok(())
}

fn find_query(file: &FileSpec) -> Result<FindQuery, Error> {
    if let Some(criteria) = file.criteria()? {
        return Ok(file.find_query(criteria));
    }
    let raw = file.build().unwrap_or_default();
    let build = BuildRef::parse(raw)?;
    let criteria = af_core::query::build_criteria(&build.name, &build.number.to_string());
    Ok(file.find_query(criteria))
}
