/// Comics that are browser-interactive rather than a static image.
///
/// Kept sorted so membership is a binary search. `404` is the reserved
/// "not found" comic, which has no image and is rendered by the reader itself.
const INTERACTIVE_COMICS: &[u32] = &[
    404, 826, 880, 1110, 1350, 1416, 1506, 1525, 1608, 1663, 1975, 2067, 2131, 2198, 2288, 2445,
    2601, 2712, 2765, 2916, 3074,
];

#[must_use]
pub fn is_interactive(id: i64) -> bool {
    u32::try_from(id)
        .map(|id| INTERACTIVE_COMICS.binary_search(&id).is_ok())
        .unwrap_or(false)
}
