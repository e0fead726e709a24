//! Reading and writing of PSF, data and weight arrays in NumPy format.
//!
//! Arrays are stored with their natural `ndarray` shape. Use [`crate::layout::flatten`] to get the
//! column-major buffer the operators work on.

use crate::error::Result;
use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use ndarray_npy::{read_npy, write_npy, NpzReader, ReadableElement, WritableElement};
use std::fs::File;
use std::path::Path;

/// Reads an array from a `.npy` file.
pub fn read_array<T, P>(path: P) -> Result<ArrayD<T>>
where
    T: ReadableElement,
    P: AsRef<Path>,
{
    let array: ArrayD<T> = read_npy(path.as_ref())?;
    log::debug!(
        "read array of shape {:?} from {}",
        array.shape(),
        path.as_ref().display()
    );
    Ok(array)
}

/// Names of the arrays stored in a `.npz` archive, without their `.npy` suffix.
pub fn npz_member_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    Ok(npz.names()?)
}

/// Reads the array named `name` from a `.npz` archive.
///
/// The `.npy` suffix of the member may be omitted, as in NumPy.
pub fn read_npz_member<T, P>(path: P, name: &str) -> Result<ArrayD<T>>
where
    T: ReadableElement,
    P: AsRef<Path>,
{
    let mut npz = NpzReader::new(File::open(path.as_ref())?)?;
    let array: ArrayD<T> = npz.by_name(name)?;
    log::debug!(
        "read {name} of shape {:?} from {}",
        array.shape(),
        path.as_ref().display()
    );
    Ok(array)
}

/// Writes an array to a `.npy` file.
pub fn write_array<A, S, D, P>(path: P, array: &ArrayBase<S, D>) -> Result<()>
where
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
    P: AsRef<Path>,
{
    write_npy(path, array)?;
    Ok(())
}
