//! Prime capacity sequence used to size `EntityCollection` tables.
//!
//! Bucket indices are `hash % capacity`; prime capacities spread hashes
//! with poor low bits (pointer addresses in particular) across buckets.

/// Largest capacity a collection table may have.
pub const MAX_CAPACITY: usize = 0x7FEF_FFFD;

/// Rejected as a table size beyond [`PRIMES`]: `(p - 1) % HASH_PRIME == 0`
/// clusters badly with multiplicative hashers.
const HASH_PRIME: usize = 101;

/// Ascending primes, each roughly 1.2x the previous one.
pub const PRIMES: [usize; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

/// Trial-division primality test for odd candidates; `2` is the only even prime.
pub fn is_prime(candidate: usize) -> bool {
    if candidate & 1 == 0 {
        return candidate == 2;
    }
    if candidate < 3 {
        return false;
    }
    let mut divisor = 3;
    while divisor <= candidate / divisor {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Smallest usable prime capacity `>= min`.
///
/// Values above [`MAX_CAPACITY`] are returned unchanged; callers reject
/// them before allocating.
pub fn get_prime(min: usize) -> usize {
    if let Some(&p) = PRIMES.iter().find(|&&p| p >= min) {
        return p;
    }
    let mut candidate = min | 1;
    while candidate <= MAX_CAPACITY {
        if is_prime(candidate) && (candidate - 1) % HASH_PRIME != 0 {
            return candidate;
        }
        candidate += 2;
    }
    min
}

/// Capacity to grow to from `old`: the next prime past `2 * old`,
/// saturating at [`MAX_CAPACITY`] once doubling would overshoot it.
pub fn expand_prime(old: usize) -> usize {
    let doubled = old.saturating_mul(2);
    if doubled > MAX_CAPACITY {
        return MAX_CAPACITY;
    }
    get_prime(doubled)
}
