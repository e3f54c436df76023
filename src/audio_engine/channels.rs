/// Writes one stereo frame into an interleaved output frame of any width.
///
/// - Mono output: the average of left and right
/// - Stereo or wider: left and right go to the first two channels, any
///   further channels are left untouched
///
/// The frame is mixed additively so several notes can share one output
/// buffer.
///
/// # Parameters
///
/// - `frame`: One interleaved output frame (`channels` samples)
/// - `left`, `right`: The stereo sample pair to add
pub fn mix_stereo_into(frame: &mut [f32], left: f32, right: f32) {
    match frame {
        [] => {}
        [mono] => *mono += (left + right) * 0.5,
        [l, r, ..] => {
            *l += left;
            *r += right;
        }
    }
}
