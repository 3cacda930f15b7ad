/// Logical key set shared by all frontends.
///
/// Frontends map their native key codes onto this enum; machines map it
/// onto whatever their input hardware looks like. Unmapped keys become
/// `None` so machines can ignore them without a catch-all at every call
/// site.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    None,
    Num1,
    Num2,
    Num3,
    Num4,
    A,
    C,
    D,
    J,
    K,
    L,
    P,
    S,
    T,
    Space,
    Left,
    Right,
    Return,
    Escape,
}
