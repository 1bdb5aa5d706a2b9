pub use internal::*;

#[cfg(feature = "single-threaded")]
mod internal {

    pub fn par_map_indexed<X: Send, F: Fn(usize) -> X + Send + Sync>(n: usize, f: F) -> Vec<X> {
        (0..n).map(f).collect()
    }

    pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
        arr1.iter_mut().enumerate().for_each(|(idx, v1)| {
            f(idx, v1);
        });
    }
}

#[cfg(not(feature = "single-threaded"))]
mod internal {
    use rayon::prelude::*;

    /// Evaluates `f` for `0..n` on the rayon pool, results stay in index order.
    pub fn par_map_indexed<X: Send, F: Fn(usize) -> X + Send + Sync>(n: usize, f: F) -> Vec<X> {
        (0..n).into_par_iter().map(f).collect()
    }

    pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
        arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
            f(idx, v1);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_index_order() {
        let v = par_map_indexed(1000, |i| i * i);
        assert!(v.iter().enumerate().all(|(i, &x)| x == i * i));
    }

    #[test]
    fn mutates_every_element() {
        let mut v = vec![0usize; 257];
        par_iter_mut1(&mut v, |i, x| *x = i + 1);
        assert_eq!(v.iter().sum::<usize>(), 257 * 258 / 2);
    }
}
