/// Read-through caching over an optional `Cache`
///
/// With `Some(cache)`, returns the cached value when present; otherwise awaits
/// `$block`, queues the result for storage and returns it. With `None` the
/// block is simply awaited. Must be used inside a function returning
/// `AppResult<_>`.
///
/// # Arguments
/// * `$cache`: an `Option<&Cache>`.
/// * `$key`: the `CacheKey` to read and write.
/// * `$ttl`: time-to-live of the stored value in seconds.
/// * `$block`: a future producing `AppResult<T>` on a miss.
///
/// # Example
/// ```rust,ignore
/// let details = cached!(self.cache.as_ref(), CacheKey::MovieDetails(id), 3600, async move {
///     fetch_details().await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache {
            Some(cache) => {
                if let Some(cached) = cache.get_from_cache(&key).await? {
                    Ok(cached)
                } else {
                    let value = $block.await?;
                    cache.set_in_background(&key, &value, $ttl);
                    Ok(value)
                }
            }
            None => $block.await,
        }
    }};
}
