/// `deserialize` reads a wire format nothing but our own `serialize` is
/// supposed to produce, but the whole point of fuzzing it is that it must
/// never panic on bytes an attacker controls — corrupt blocks, truncated
/// varints, bogus compression tags, all of it has to come back as `Err`.
pub fn de(input: &[u8]) {
    let _ = tapeson::codec::deserialize(input);
}
